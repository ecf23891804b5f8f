// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile read and update handlers.
//!
//! Profiles fetch by public key, bech32 address, or address hex; unknown
//! identities fetch as the empty profile rather than a 404. The update
//! handler is nonce-guarded and creates the profile on first use.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::SignedEnvelope;
use crate::chain::{get_chain, pubkey::bech32_to_bytes, ChainPublicKey};
use crate::error::ApiError;
use crate::models::{
    DnasKeyInfo, FetchedProfile, NonceResponse, ProfileChainAccount, ProfileNftWithImage,
    PublicKeyJson, ResolveProfileResponse, ResolvedProfile, SearchProfilesResponse, StatsResponse,
    SuccessResponse, UpdateProfileRequest,
};
use crate::state::AppState;
use crate::storage::{
    DnasKeyRepository, ProfileRecord, ProfileRepository, PublicKeyRecord, PublicKeyRepository,
};

/// Profile names: 1-32 chars of letters, digits, dot, underscore.
const NAME_MAX_LENGTH: usize = 32;

#[utoipa::path(
    get,
    path = "/nonce/{publicKey}",
    params(("publicKey" = String, Path, description = "Public key hex")),
    tag = "Profiles",
    responses((status = 200, body = NonceResponse))
)]
pub async fn get_nonce(
    Path(public_key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<NonceResponse>, ApiError> {
    let nonce = ProfileRepository::new(&state.db).nonce_for_public_key(public_key.trim())?;
    Ok(Json(NonceResponse { nonce }))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Profiles",
    responses((status = 200, body = StatsResponse))
)]
pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let (profiles, public_keys, dnas_keys) = state.db.counts()?;
    Ok(Json(StatsResponse {
        profiles,
        public_keys,
        dnas_keys,
    }))
}

#[utoipa::path(
    get,
    path = "/{publicKey}",
    params(("publicKey" = String, Path, description = "Public key hex")),
    tag = "Profiles",
    responses((status = 200, body = FetchedProfile))
)]
pub async fn fetch_profile_by_public_key(
    Path(public_key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FetchedProfile>, ApiError> {
    let row = ProfileRepository::new(&state.db).get_by_public_key_hex(public_key.trim())?;
    Ok(Json(load_fetched_profile(&state, row).await?))
}

#[utoipa::path(
    get,
    path = "/address/{bech32Address}",
    params(("bech32Address" = String, Path, description = "Bech32 account address")),
    tag = "Profiles",
    responses((status = 200, body = FetchedProfile))
)]
pub async fn fetch_profile_by_bech32_address(
    Path(bech32_address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FetchedProfile>, ApiError> {
    let address_hex = hex::encode(
        bech32_to_bytes(bech32_address.trim())
            .map_err(|_| ApiError::bad_request("Invalid bech32 address."))?,
    );
    let row = ProfileRepository::new(&state.db).get_by_address_hex(&address_hex)?;
    Ok(Json(load_fetched_profile(&state, row).await?))
}

#[utoipa::path(
    get,
    path = "/hex/{addressHex}",
    params(("addressHex" = String, Path, description = "Account address hex")),
    tag = "Profiles",
    responses((status = 200, body = FetchedProfile))
)]
pub async fn fetch_profile_by_address_hex(
    Path(address_hex): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FetchedProfile>, ApiError> {
    let row = ProfileRepository::new(&state.db).get_by_address_hex(address_hex.trim())?;
    Ok(Json(load_fetched_profile(&state, row).await?))
}

#[utoipa::path(
    get,
    path = "/search/{chainId}/{namePrefix}",
    params(
        ("chainId" = String, Path, description = "Chain to resolve keys on"),
        ("namePrefix" = String, Path, description = "Name prefix to search")
    ),
    tag = "Profiles",
    responses((status = 200, body = SearchProfilesResponse))
)]
pub async fn search_profiles(
    Path((chain_id, name_prefix)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<SearchProfilesResponse>, ApiError> {
    let rows =
        ProfileRepository::new(&state.db).search_by_name_prefix(name_prefix.trim(), &chain_id, 5)?;

    let mut profiles = Vec::with_capacity(rows.len());
    for (profile, key_row) in rows {
        if let Some(resolved) = resolve_row(&state, &chain_id, profile, key_row).await? {
            profiles.push(resolved);
        }
    }
    Ok(Json(SearchProfilesResponse { profiles }))
}

#[utoipa::path(
    get,
    path = "/resolve/{chainId}/{name}",
    params(
        ("chainId" = String, Path, description = "Chain to resolve keys on"),
        ("name" = String, Path, description = "Exact profile name")
    ),
    tag = "Profiles",
    responses((status = 200, body = ResolveProfileResponse), (status = 404))
)]
pub async fn resolve_profile(
    Path((chain_id, name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<ResolveProfileResponse>, ApiError> {
    let profiles = ProfileRepository::new(&state.db);
    let Some(profile) = profiles.get_by_name(name.trim())? else {
        return Err(ApiError::not_found("Profile not found."));
    };
    let Some(key_row) =
        PublicKeyRepository::new(&state.db).preferred_for_chain(profile.id, &chain_id)?
    else {
        return Err(ApiError::not_found(
            "Profile has no public key on this chain.",
        ));
    };

    match resolve_row(&state, &chain_id, profile, key_row).await? {
        Some(resolved) => Ok(Json(ResolveProfileResponse { resolved })),
        None => Err(ApiError::bad_request("Unknown chain.")),
    }
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Profiles",
    responses((status = 200, body = SuccessResponse), (status = 401))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: UpdateProfileRequest = envelope.payload()?;

    let profiles = ProfileRepository::new(&state.db);
    let existing = profiles.get_by_public_key_hex(sender.public_key.hex())?;
    let current_nonce = existing.as_ref().map(|(p, _)| p.nonce).unwrap_or(0);

    // Validate nonce to prevent replay attacks.
    if request.profile.nonce != current_nonce {
        return Err(ApiError::stale_nonce(current_nonce));
    }

    if let Some(Some(name)) = &request.profile.name {
        validate_name(name)?;
    }

    if let Some(chain_ids) = &request.chain_ids {
        validate_chains(chain_ids)?;
    }

    // Verify NFT ownership before accepting it onto the profile.
    if let Some(Some(nft)) = &request.profile.nft {
        let chain = get_chain(&nft.chain_id)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown chain: {}", nft.chain_id)))?;
        let owner = sender
            .public_key
            .bech32_address(chain.bech32_prefix)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let image = state
            .indexer
            .owned_nft_image_url(&nft.chain_id, &owner, &nft.collection_address, &nft.token_id)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to verify NFT ownership: {e}")))?;
        if image.is_none() {
            return Err(ApiError::unauthorized("You do not own this NFT."));
        }
    }

    match existing {
        Some((profile, _)) => {
            profiles.update(
                profile.id,
                current_nonce + 1,
                request.profile.name,
                request.profile.nft,
            )?;
            if let Some(chain_ids) = &request.chain_ids {
                PublicKeyRepository::new(&state.db).attach(
                    profile.id,
                    &sender.public_key,
                    chain_ids,
                )?;
            }
        }
        None => {
            let chain_ids = request
                .chain_ids
                .unwrap_or_else(|| vec![sender.auth.chain_id.clone()]);
            profiles.create_with_key(
                &sender.public_key,
                current_nonce + 1,
                request.profile.name.flatten(),
                request.profile.nft.flatten(),
                &chain_ids,
            )?;
        }
    }

    Ok(Json(SuccessResponse::ok()))
}

/// Build the full fetch-profile response for a looked-up row.
pub(super) async fn load_fetched_profile(
    state: &AppState,
    row: Option<(ProfileRecord, PublicKeyRecord)>,
) -> Result<FetchedProfile, ApiError> {
    let mut fetched = FetchedProfile::empty();
    let Some((profile, _)) = row else {
        return Ok(fetched);
    };

    fetched.uuid = profile.uuid.clone();
    fetched.nonce = profile.nonce;
    fetched.name = profile
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    // DNAS rows grouped by chain.
    let mut dnas_by_chain: BTreeMap<String, BTreeMap<String, DnasKeyInfo>> = BTreeMap::new();
    for dnas_row in DnasKeyRepository::new(&state.db).list_for_profile(profile.id)? {
        dnas_by_chain
            .entry(dnas_row.chain_id.clone())
            .or_default()
            .insert(dnas_row.dao_addr.clone(), DnasKeyInfo::from(&dnas_row));
    }

    // One account entry per chain preference; chains this build does not
    // know the prefix for are skipped rather than failing the fetch.
    for (chain_id, key_row) in
        PublicKeyRepository::new(&state.db).preferences_for_profile(profile.id)?
    {
        let Some(chain) = get_chain(&chain_id) else {
            continue;
        };
        let Ok(key) = ChainPublicKey::from_hex(&key_row.key_type, &key_row.public_key_hex) else {
            continue;
        };
        let Ok(address) = key.bech32_address(chain.bech32_prefix) else {
            continue;
        };
        fetched.chains.insert(
            chain_id.clone(),
            ProfileChainAccount {
                public_key: PublicKeyJson {
                    kind: key_row.key_type.clone(),
                    hex: key_row.public_key_hex.clone(),
                },
                address,
                dnas: dnas_by_chain.remove(&chain_id).unwrap_or_default(),
            },
        );
    }

    // Verify the selected NFT still belongs to this profile before
    // responding with it. On error, just ignore and return no NFT.
    if let Some(nft) = &profile.nft {
        if let Some(account) = fetched.chains.get(&nft.chain_id) {
            match state
                .indexer
                .owned_nft_image_url(
                    &nft.chain_id,
                    &account.address,
                    &nft.collection_address,
                    &nft.token_id,
                )
                .await
            {
                Ok(Some(image_url)) => {
                    fetched.nft = Some(ProfileNftWithImage {
                        chain_id: nft.chain_id.clone(),
                        collection_address: nft.collection_address.clone(),
                        token_id: nft.token_id.clone(),
                        image_url,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "NFT image lookup failed");
                }
            }
        }
    }

    Ok(fetched)
}

/// Build a resolved-profile row for search/resolve responses.
async fn resolve_row(
    state: &AppState,
    chain_id: &str,
    profile: ProfileRecord,
    key_row: PublicKeyRecord,
) -> Result<Option<ResolvedProfile>, ApiError> {
    let Some(chain) = get_chain(chain_id) else {
        return Ok(None);
    };
    let Ok(key) = ChainPublicKey::from_hex(&key_row.key_type, &key_row.public_key_hex) else {
        return Ok(None);
    };
    let Ok(address) = key.bech32_address(chain.bech32_prefix) else {
        return Ok(None);
    };

    let nft = match &profile.nft {
        Some(nft) if nft.chain_id == chain_id => state
            .indexer
            .owned_nft_image_url(&nft.chain_id, &address, &nft.collection_address, &nft.token_id)
            .await
            .ok()
            .flatten()
            .map(|image_url| ProfileNftWithImage {
                chain_id: nft.chain_id.clone(),
                collection_address: nft.collection_address.clone(),
                token_id: nft.token_id.clone(),
                image_url,
            }),
        _ => None,
    };

    Ok(Some(ResolvedProfile {
        uuid: profile.uuid,
        public_key: PublicKeyJson {
            kind: key_row.key_type,
            hex: key_row.public_key_hex,
        },
        address,
        name: profile.name,
        nft,
    }))
}

/// Reject names outside the allowed shape.
fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty."));
    }
    if name.len() > NAME_MAX_LENGTH {
        return Err(ApiError::bad_request("Name cannot be longer than 32 characters."));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
    {
        return Err(ApiError::bad_request(
            "Name can only contain alphanumeric characters, periods, and underscores.",
        ));
    }
    Ok(())
}

/// Reject preference updates naming chains this build cannot render.
pub(super) fn validate_chains(chain_ids: &[String]) -> Result<(), ApiError> {
    for chain_id in chain_ids {
        if get_chain(chain_id).is_none() {
            return Err(ApiError::bad_request(format!("Unknown chain: {chain_id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{signed_envelope, TestSigner};
    use axum::http::StatusCode;
    use serde_json::json;

    fn update_request(signer: &TestSigner, nonce: u64, profile: serde_json::Value) -> SignedEnvelope {
        signed_envelope(signer, nonce, json!({ "profile": profile }))
    }

    #[tokio::test]
    async fn nonce_starts_at_zero_and_tracks_updates() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(71);

        let Json(response) = get_nonce(
            Path(signer.public_key_hex()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(response.nonce, 0);

        update_profile(
            State(state.clone()),
            Json(update_request(&signer, 0, json!({ "nonce": 0, "name": "alice" }))),
        )
        .await
        .unwrap();

        let Json(response) = get_nonce(Path(signer.public_key_hex()), State(state)).await.unwrap();
        assert_eq!(response.nonce, 1);
    }

    #[tokio::test]
    async fn update_creates_profile_and_fetch_returns_it() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(72);

        update_profile(
            State(state.clone()),
            Json(update_request(&signer, 0, json!({ "nonce": 0, "name": "alice" }))),
        )
        .await
        .unwrap();

        let Json(profile) = fetch_profile_by_public_key(
            Path(signer.public_key_hex()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(profile.name.as_deref(), Some("alice"));
        assert_eq!(profile.nonce, 1);
        assert!(!profile.uuid.is_empty());

        // The signing chain became the default preference.
        let account = profile.chains.get("juno-1").expect("juno-1 account");
        assert_eq!(account.address, signer.bech32_address());
        assert_eq!(account.public_key.hex, signer.public_key_hex());

        // Same profile by bech32 address and by address hex.
        let Json(by_address) = fetch_profile_by_bech32_address(
            Path(signer.bech32_address()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(by_address.uuid, profile.uuid);

        let Json(by_hex) =
            fetch_profile_by_address_hex(Path(signer.address_hex()), State(state)).await.unwrap();
        assert_eq!(by_hex.uuid, profile.uuid);
    }

    #[tokio::test]
    async fn unknown_identity_fetches_as_empty_profile() {
        let (state, _dir) = AppState::for_tests();
        let Json(profile) = fetch_profile_by_public_key(
            Path("02deadbeef".to_string()),
            State(state),
        )
        .await
        .unwrap();
        assert_eq!(profile.uuid, "");
        assert_eq!(profile.nonce, 0);
        assert!(profile.chains.is_empty());
    }

    #[tokio::test]
    async fn replayed_envelope_is_rejected() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(73);

        let envelope = update_request(&signer, 0, json!({ "nonce": 0, "name": "first" }));
        update_profile(State(state.clone()), Json(envelope.clone()))
            .await
            .unwrap();

        // Nonce moved to 1; replaying the accepted envelope must fail closed.
        let err = update_profile(State(state.clone()), Json(envelope))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid nonce. Expected: 1");

        // And the profile is unchanged.
        let Json(profile) =
            fetch_profile_by_public_key(Path(signer.public_key_hex()), State(state))
                .await
                .unwrap();
        assert_eq!(profile.name.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn tampered_signature_is_unauthorized() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(74);

        let mut envelope = update_request(&signer, 0, json!({ "nonce": 0, "name": "alice" }));
        envelope.data["profile"]["name"] = json!("mallory");

        let err = update_profile(State(state), Json(envelope)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let (state, _dir) = AppState::for_tests();

        let too_long = "x".repeat(33);
        for (seed, name) in [(75u8, "has space"), (76, ""), (77, too_long.as_str())] {
            let signer = TestSigner::new(seed);
            let err = update_profile(
                State(state.clone()),
                Json(update_request(&signer, 0, json!({ "nonce": 0, "name": name }))),
            )
            .await
            .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST, "name {name:?}");
        }
    }

    #[tokio::test]
    async fn taken_name_conflicts() {
        let (state, _dir) = AppState::for_tests();
        let first = TestSigner::new(78);
        let second = TestSigner::new(79);

        update_profile(
            State(state.clone()),
            Json(update_request(&first, 0, json!({ "nonce": 0, "name": "taken" }))),
        )
        .await
        .unwrap();

        let err = update_profile(
            State(state),
            Json(update_request(&second, 0, json!({ "nonce": 0, "name": "taken" }))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Name already taken.");
    }

    #[tokio::test]
    async fn search_and_resolve_find_profiles_by_name() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(80);

        update_profile(
            State(state.clone()),
            Json(update_request(&signer, 0, json!({ "nonce": 0, "name": "searchme" }))),
        )
        .await
        .unwrap();

        let Json(results) = search_profiles(
            Path(("juno-1".to_string(), "search".to_string())),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(results.profiles.len(), 1);
        assert_eq!(results.profiles[0].address, signer.bech32_address());

        let Json(resolved) = resolve_profile(
            Path(("juno-1".to_string(), "searchme".to_string())),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(resolved.resolved.name.as_deref(), Some("searchme"));

        let err = resolve_profile(
            Path(("juno-1".to_string(), "missing".to_string())),
            State(state),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_count_rows() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(81);

        update_profile(
            State(state.clone()),
            Json(update_request(&signer, 0, json!({ "nonce": 0 }))),
        )
        .await
        .unwrap();

        let Json(response) = stats(State(state)).await.unwrap();
        assert_eq!(response.profiles, 1);
        assert_eq!(response.public_keys, 1);
        assert_eq!(response.dnas_keys, 0);
    }

    #[tokio::test]
    async fn unknown_chain_preference_is_rejected() {
        let (state, _dir) = AppState::for_tests();
        let signer = TestSigner::new(82);

        let envelope = signed_envelope(
            &signer,
            0,
            json!({ "profile": { "nonce": 0 }, "chainIds": ["fake-9"] }),
        );
        let err = update_profile(State(state), Json(envelope)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Unknown chain: fake-9");
    }
}
