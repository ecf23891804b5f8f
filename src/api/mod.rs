// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        DnasKeyInfo, FetchedProfile, NonceResponse, PinnedFile, ProfileChainAccount,
        ProfileNftWithImage, PublicKeyJson, ResolveProfileResponse, ResolvedProfile,
        SearchProfilesResponse, StatsResponse, SuccessResponse, UseDnasKeyResponse,
    },
    state::AppState,
};

pub mod dnas;
pub mod health;
pub mod keys;
pub mod profiles;
pub mod relay;

/// Upload relay request ceiling (50 MiB across all multipart parts).
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/stats", get(profiles::stats))
        .route("/nonce/{publicKey}", get(profiles::get_nonce))
        .route("/search/{chainId}/{namePrefix}", get(profiles::search_profiles))
        .route("/resolve/{chainId}/{name}", get(profiles::resolve_profile))
        .route("/address/{bech32Address}", get(profiles::fetch_profile_by_bech32_address))
        .route("/hex/{addressHex}", get(profiles::fetch_profile_by_address_hex))
        // Backwards compatible.
        .route("/bech32/{addressHex}", get(profiles::fetch_profile_by_address_hex))
        .route("/", post(profiles::update_profile))
        .route("/register", post(keys::register_public_keys))
        .route("/unregister", post(keys::unregister_public_keys))
        .route("/register-dnas", post(dnas::register_dnas_keys))
        .route("/update-dnas", post(dnas::update_dnas_keys))
        .route("/unregister-dnas", post(dnas::unregister_dnas_keys))
        .route(
            "/use-dnas",
            post(relay::use_dnas_keys).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/daoKeys/address/{bech32Address}", get(dnas::fetch_dao_keys_by_bech32))
        .route("/daoKeys/hex/{addressHex}", get(dnas::fetch_dao_keys_by_hex))
        // Backwards compatible.
        .route("/daoKeys/bech32/{addressHex}", get(dnas::fetch_dao_keys_by_hex))
        .route("/{publicKey}", get(profiles::fetch_profile_by_public_key))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        profiles::stats,
        profiles::get_nonce,
        profiles::search_profiles,
        profiles::resolve_profile,
        profiles::fetch_profile_by_public_key,
        profiles::fetch_profile_by_bech32_address,
        profiles::fetch_profile_by_address_hex,
        profiles::update_profile,
        keys::register_public_keys,
        keys::unregister_public_keys,
        dnas::register_dnas_keys,
        dnas::update_dnas_keys,
        dnas::unregister_dnas_keys,
        dnas::fetch_dao_keys_by_bech32,
        dnas::fetch_dao_keys_by_hex,
        relay::use_dnas_keys
    ),
    components(
        schemas(
            FetchedProfile,
            ProfileChainAccount,
            ProfileNftWithImage,
            PublicKeyJson,
            ResolvedProfile,
            ResolveProfileResponse,
            SearchProfilesResponse,
            DnasKeyInfo,
            NonceResponse,
            StatsResponse,
            SuccessResponse,
            PinnedFile,
            UseDnasKeyResponse
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Profiles", description = "Profile lookup and updates"),
        (name = "Keys", description = "Public key registration"),
        (name = "DNAS", description = "DAO-scoped credential delegation")
    )
)]
struct ApiDoc;
