// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key registration handlers.
//!
//! Registering a key requires two signatures: the profile owner signs the
//! outer envelope, and the key being registered signs a nested envelope
//! whose `allow` field names the owner's key. A key registered under a new
//! profile moves there exclusively; removing a profile's last key deletes
//! the profile.

use axum::{extract::State, Json};

use crate::auth::{SignedEnvelope, VerifiedSender};
use crate::error::ApiError;
use crate::models::{
    RegisterKeyAuthorization, RegisterPublicKeysRequest, SuccessResponse,
    UnregisterPublicKeysRequest,
};
use crate::state::AppState;
use crate::storage::{ProfileRecord, ProfileRepository, PublicKeyRepository};

use super::profiles::validate_chains;

#[utoipa::path(
    post,
    path = "/register",
    tag = "Keys",
    responses((status = 200, body = SuccessResponse), (status = 401))
)]
pub async fn register_public_keys(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: RegisterPublicKeysRequest = envelope.payload()?;

    // Every nested authorization must verify on its own and must explicitly
    // allow the outer sender's key to claim it.
    let mut authorized: Vec<(VerifiedSender, RegisterKeyAuthorization)> =
        Vec::with_capacity(request.public_keys.len());
    for nested in &request.public_keys {
        let key_sender = nested.verify()?;
        let authorization: RegisterKeyAuthorization = nested.payload()?;
        if !authorization
            .allow
            .eq_ignore_ascii_case(sender.public_key.hex())
        {
            return Err(ApiError::unauthorized(
                "Unauthorized. Public key authorization does not allow this registrant.",
            ));
        }
        if let Some(chain_ids) = &authorization.chain_ids {
            validate_chains(chain_ids)?;
        }
        authorized.push((key_sender, authorization));
    }

    let profile = ensure_profile(&state, &sender)?;

    // Validate all nonces to prevent replay attacks.
    if sender.auth.nonce != profile.nonce
        || authorized
            .iter()
            .any(|(key_sender, _)| key_sender.auth.nonce != profile.nonce)
    {
        return Err(ApiError::stale_nonce(profile.nonce));
    }

    ProfileRepository::new(&state.db).increment_nonce(profile.id)?;

    let keys = PublicKeyRepository::new(&state.db);
    for (key_sender, authorization) in &authorized {
        keys.attach(
            profile.id,
            &key_sender.public_key,
            authorization.chain_ids.as_deref().unwrap_or(&[]),
        )?;
    }

    Ok(Json(SuccessResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/unregister",
    tag = "Keys",
    responses((status = 200, body = SuccessResponse), (status = 401), (status = 404))
)]
pub async fn unregister_public_keys(
    State(state): State<AppState>,
    Json(envelope): Json<SignedEnvelope>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let sender = envelope.verify()?;
    let request: UnregisterPublicKeysRequest = envelope.payload()?;

    let profiles = ProfileRepository::new(&state.db);
    let Some((profile, _)) = profiles.get_by_public_key_hex(sender.public_key.hex())? else {
        return Err(ApiError::not_found("Profile not found."));
    };

    // Validate nonce to prevent replay attacks.
    if sender.auth.nonce != profile.nonce {
        return Err(ApiError::stale_nonce(profile.nonce));
    }
    profiles.increment_nonce(profile.id)?;

    let targets: Vec<(String, String)> = request
        .public_keys
        .iter()
        .map(|key| (key.kind.clone(), key.hex.clone()))
        .collect();
    PublicKeyRepository::new(&state.db).remove(profile.id, &targets)?;

    Ok(Json(SuccessResponse::ok()))
}

/// Fetch the sender's profile, creating an empty one on first contact.
pub(super) fn ensure_profile(
    state: &AppState,
    sender: &VerifiedSender,
) -> Result<ProfileRecord, ApiError> {
    let profiles = ProfileRepository::new(&state.db);
    if let Some((profile, _)) = profiles.get_by_public_key_hex(sender.public_key.hex())? {
        return Ok(profile);
    }
    // Create with the current chain preference; nonce checks run against
    // the fresh profile's initial nonce.
    Ok(profiles.create_with_key(
        &sender.public_key,
        0,
        None,
        None,
        std::slice::from_ref(&sender.auth.chain_id),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{signed_envelope, TestSigner};
    use axum::http::StatusCode;
    use serde_json::json;

    /// Outer envelope registering `key` onto `owner`'s profile.
    fn register_envelope(
        owner: &TestSigner,
        key: &TestSigner,
        owner_nonce: u64,
        chain_ids: serde_json::Value,
    ) -> SignedEnvelope {
        let nested = signed_envelope(
            key,
            owner_nonce,
            json!({ "allow": owner.public_key_hex(), "chainIds": chain_ids }),
        );
        signed_envelope(
            owner,
            owner_nonce,
            json!({ "publicKeys": [serde_json::to_value(&nested).unwrap()] }),
        )
    }

    fn unregister_envelope(owner: &TestSigner, nonce: u64, keys: Vec<serde_json::Value>) -> SignedEnvelope {
        signed_envelope(owner, nonce, json!({ "publicKeys": keys }))
    }

    fn key_json(signer: &TestSigner) -> serde_json::Value {
        json!({
            "type": "/cosmos.crypto.secp256k1.PubKey",
            "hex": signer.public_key_hex(),
        })
    }

    #[tokio::test]
    async fn register_attaches_key_and_creates_profile() {
        let (state, _dir) = AppState::for_tests();
        let owner = TestSigner::new(91);
        let extra = TestSigner::new(92);

        register_public_keys(
            State(state.clone()),
            Json(register_envelope(&owner, &extra, 0, json!(["osmosis-1"]))),
        )
        .await
        .unwrap();

        let profiles = ProfileRepository::new(&state.db);
        let (profile, _) = profiles
            .get_by_public_key_hex(&owner.public_key_hex())
            .unwrap()
            .unwrap();
        assert_eq!(profile.nonce, 1);

        let (same_profile, _) = profiles
            .get_by_public_key_hex(&extra.public_key_hex())
            .unwrap()
            .unwrap();
        assert_eq!(same_profile.id, profile.id);
    }

    #[tokio::test]
    async fn register_requires_matching_allow() {
        let (state, _dir) = AppState::for_tests();
        let owner = TestSigner::new(93);
        let extra = TestSigner::new(94);
        let imposter = TestSigner::new(95);

        // The nested authorization allows the imposter, not the sender.
        let nested = signed_envelope(
            &extra,
            0,
            json!({ "allow": imposter.public_key_hex() }),
        );
        let envelope = signed_envelope(
            &owner,
            0,
            json!({ "publicKeys": [serde_json::to_value(&nested).unwrap()] }),
        );
        let err = register_public_keys(State(state), Json(envelope))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reregistering_moves_key_to_latest_profile() {
        let (state, _dir) = AppState::for_tests();
        let first = TestSigner::new(96);
        let second = TestSigner::new(97);
        let contested = TestSigner::new(98);

        register_public_keys(
            State(state.clone()),
            Json(register_envelope(&first, &contested, 0, json!([]))),
        )
        .await
        .unwrap();

        register_public_keys(
            State(state.clone()),
            Json(register_envelope(&second, &contested, 0, json!([]))),
        )
        .await
        .unwrap();

        let profiles = ProfileRepository::new(&state.db);
        let (owner_profile, _) = profiles
            .get_by_public_key_hex(&contested.public_key_hex())
            .unwrap()
            .unwrap();
        let (second_profile, _) = profiles
            .get_by_public_key_hex(&second.public_key_hex())
            .unwrap()
            .unwrap();
        assert_eq!(owner_profile.id, second_profile.id);

        // The first profile kept only its own key.
        let (first_profile, _) = profiles
            .get_by_public_key_hex(&first.public_key_hex())
            .unwrap()
            .unwrap();
        assert_eq!(
            PublicKeyRepository::new(&state.db)
                .list_for_profile(first_profile.id)
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn stale_nonce_in_nested_authorization_is_rejected() {
        let (state, _dir) = AppState::for_tests();
        let owner = TestSigner::new(99);
        let extra = TestSigner::new(100);

        // Move the profile nonce to 1.
        register_public_keys(
            State(state.clone()),
            Json(register_envelope(&owner, &extra, 0, json!([]))),
        )
        .await
        .unwrap();

        // Outer nonce is right (1) but the nested one replays 0.
        let stale_nested = signed_envelope(
            &TestSigner::new(101),
            0,
            json!({ "allow": owner.public_key_hex() }),
        );
        let envelope = signed_envelope(
            &owner,
            1,
            json!({ "publicKeys": [serde_json::to_value(&stale_nested).unwrap()] }),
        );

        let err = register_public_keys(State(state), Json(envelope)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "Invalid nonce. Expected: 1");
    }

    #[tokio::test]
    async fn unregister_requires_existing_profile() {
        let (state, _dir) = AppState::for_tests();
        let owner = TestSigner::new(102);

        let err = unregister_public_keys(
            State(state),
            Json(unregister_envelope(&owner, 0, vec![key_json(&owner)])),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unregistering_last_key_deletes_profile_and_dao_keys() {
        let (state, _dir) = AppState::for_tests();
        let owner = TestSigner::new(103);

        // Create the profile, then give it a DNAS row directly.
        let profile = ensure_profile(
            &state,
            &signed_envelope(&owner, 0, json!({})).verify().unwrap(),
        )
        .unwrap();
        crate::storage::DnasKeyRepository::new(&state.db)
            .upsert(
                profile.id,
                "juno-1",
                "juno1dao",
                &owner.bech32_address(),
                "{}",
                None,
                "c2VjcmV0",
            )
            .unwrap();

        unregister_public_keys(
            State(state.clone()),
            Json(unregister_envelope(&owner, 0, vec![key_json(&owner)])),
        )
        .await
        .unwrap();

        assert_eq!(state.db.counts().unwrap(), (0, 0, 0));
    }
}
