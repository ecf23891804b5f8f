// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DNAS credential handlers.
//!
//! Registration verifies two facts against the chain indexer per entry:
//! the DAO has enabled the DNAS widget, and the registering key is a DAO
//! member. Updates and removals are plain nonce-guarded mutations against
//! the caller's own rows. The daoKeys fetch is the public listing a DAO
//! frontend uses to find spendable credentials.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::auth::{SignedEnvelope, VerifiedSender};
use crate::error::ApiError;
use crate::models::{
    DnasKeyInfo, DnasKeyRegistration, FetchedDaoKeys, RegisterDnasKeysRequest, SuccessResponse,
    UnregisterDnasKeysRequest, UpdateDnasKeysRequest,
};
use crate::state::AppState;
use crate::storage::{DnasKeyRepository, ProfileRepository};

use super::keys::ensure_profile;

#[utoipa::path(
    post,
    path = "/register-dnas",
    tag = "DNAS",
    responses((status = 200, body = SuccessResponse), (status = 401))
)]
pub async fn register_dnas_keys(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: RegisterDnasKeysRequest = envelope.payload()?;

    if request.dnas_api_keys.is_empty() {
        return Err(ApiError::bad_request("No DNAS keys to register."));
    }

    // Each entry is signed by a DAO member key; check the signature, the
    // DAO's widget config, and the signer's membership before touching
    // anything.
    let mut registrations: Vec<(VerifiedSender, DnasKeyRegistration)> =
        Vec::with_capacity(request.dnas_api_keys.len());
    for nested in &request.dnas_api_keys {
        let key_sender = nested.verify()?;
        let registration: DnasKeyRegistration = nested.payload()?;

        let widget = state
            .indexer
            .dnas_widget_params(&key_sender.auth.chain_id, &registration.dao)
            .await
            .map_err(|e| {
                ApiError::internal(format!("Failed to get the DAO's DNAS widget config: {e}"))
            })?;
        if widget.is_none() {
            return Err(ApiError::bad_request(format!(
                "DAO has not enabled the DNAS widget: {}",
                registration.dao
            )));
        }

        verify_membership(&state, &key_sender, &registration.dao).await?;
        registrations.push((key_sender, registration));
    }

    let profile = ensure_profile(&state, &sender)?;

    // Validate all nonces to prevent replay attacks.
    if sender.auth.nonce != profile.nonce
        || registrations
            .iter()
            .any(|(key_sender, _)| key_sender.auth.nonce != profile.nonce)
    {
        return Err(ApiError::stale_nonce(profile.nonce));
    }

    ProfileRepository::new(&state.db).increment_nonce(profile.id)?;

    let dnas = DnasKeyRepository::new(&state.db);
    for (key_sender, registration) in &registrations {
        dnas.upsert(
            profile.id,
            &key_sender.auth.chain_id,
            &registration.dao,
            &key_sender.signer,
            registration.dnas.key_metadata.as_deref().unwrap_or("{}"),
            registration.dnas.upload_limit.clone(),
            &registration.dnas.api_key_value,
        )?;
    }

    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/update-dnas",
    tag = "DNAS",
    responses((status = 200, body = SuccessResponse), (status = 401), (status = 404))
)]
pub async fn update_dnas_keys(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: UpdateDnasKeysRequest = envelope.payload()?;

    let profiles = ProfileRepository::new(&state.db);
    let Some((profile, _)) = profiles.get_by_public_key_hex(sender.public_key.hex())? else {
        return Err(ApiError::not_found("Profile not found."));
    };

    // Validate nonce to prevent replay attacks.
    if sender.auth.nonce != profile.nonce {
        return Err(ApiError::stale_nonce(profile.nonce));
    }
    profiles.increment_nonce(profile.id)?;

    let dnas = DnasKeyRepository::new(&state.db);
    for entry in &request.dnas {
        let chain_id = entry.chain_id.as_deref().unwrap_or(&sender.auth.chain_id);
        match &entry.dnas_key {
            Some(fields) => {
                dnas.upsert(
                    profile.id,
                    chain_id,
                    &entry.dao_addr,
                    &sender.signer,
                    fields.key_metadata.as_deref().unwrap_or("{}"),
                    fields.upload_limit.clone(),
                    &fields.api_key_value,
                )?;
            }
            // A null credential clears the row for that DAO.
            None => {
                dnas.remove_for_daos(
                    profile.id,
                    &[format!("{}:{}", chain_id, entry.dao_addr)],
                )?;
            }
        }
    }

    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/unregister-dnas",
    tag = "DNAS",
    responses((status = 200, body = SuccessResponse), (status = 401), (status = 404))
)]
pub async fn unregister_dnas_keys(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: UnregisterDnasKeysRequest = envelope.payload()?;

    let profiles = ProfileRepository::new(&state.db);
    let Some((profile, _)) = profiles.get_by_public_key_hex(sender.public_key.hex())? else {
        return Err(ApiError::not_found("Profile not found."));
    };

    // Validate nonce to prevent replay attacks.
    if sender.auth.nonce != profile.nonce {
        return Err(ApiError::stale_nonce(profile.nonce));
    }
    profiles.increment_nonce(profile.id)?;

    DnasKeyRepository::new(&state.db).remove_for_daos(profile.id, &request.daos)?;

    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    get,
    path = "/daoKeys/address/{bech32Address}",
    params(("bech32Address" = String, Path, description = "DAO bech32 address")),
    tag = "DNAS",
    responses((status = 200))
)]
pub async fn fetch_dao_keys_by_bech32(
    Path(bech32_address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FetchedDaoKeys>, ApiError> {
    fetch_dao_keys(&state, bech32_address.trim())
}

#[utoipa::path(
    get,
    path = "/daoKeys/hex/{addressHex}",
    params(("addressHex" = String, Path, description = "DAO address hex")),
    tag = "DNAS",
    responses((status = 200))
)]
pub async fn fetch_dao_keys_by_hex(
    Path(address_hex): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FetchedDaoKeys>, ApiError> {
    fetch_dao_keys(&state, address_hex.trim())
}

/// All credentials registered for a DAO, keyed by the registering member's
/// address.
fn fetch_dao_keys(state: &AppState, dao: &str) -> Result<Json<FetchedDaoKeys>, ApiError> {
    if dao.is_empty() {
        return Err(ApiError::bad_request("Missing DAO address."));
    }

    let rows = DnasKeyRepository::new(&state.db).list_for_dao(dao)?;
    let mut keys: BTreeMap<String, DnasKeyInfo> = BTreeMap::new();
    for row in &rows {
        keys.insert(row.key_owner.clone(), DnasKeyInfo::from(row));
    }
    Ok(Json(keys))
}

/// 401 unless the signer holds voting power in the DAO.
pub(super) async fn verify_membership(
    state: &AppState,
    sender: &VerifiedSender,
    dao: &str,
) -> Result<(), ApiError> {
    let is_member = state
        .indexer
        .is_dao_member(&sender.auth.chain_id, &sender.signer, dao)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get the address voting power: {e}")))?;
    if !is_member {
        return Err(ApiError::unauthorized(format!(
            "{} is not member of DAO: {}",
            sender.signer, dao
        )));
    }
    Ok(())
}
