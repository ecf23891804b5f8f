// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential relay: `POST /use-dnas`.
//!
//! A verified DAO member spends another profile's stored credential without
//! ever seeing it. The multipart body carries the signed envelope in an
//! `auth` field (`sign` accepted as a legacy alias) and the payload in
//! `files` fields; the handler resolves the owner's credential and re-posts
//! the files to the pinning API as a bearer token.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::auth::SignedEnvelope;
use crate::error::ApiError;
use crate::models::{UseDnasKeyRequest, UseDnasKeyResponse};
use crate::providers::{PinUpload, RelayFile};
use crate::state::AppState;
use crate::storage::{DnasKeyRepository, ProfileRecord, ProfileRepository};

use super::dnas::verify_membership;

#[utoipa::path(
    post,
    path = "/use-dnas",
    tag = "DNAS",
    responses(
        (status = 200, body = UseDnasKeyResponse),
        (status = 400),
        (status = 401, description = "Bad signature or not a DAO member")
    )
)]
pub async fn use_dnas_keys(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UseDnasKeyResponse>, ApiError> {
    let (envelope, files) = read_multipart(multipart).await?;

    let sender = envelope.verify()?;
    let request: UseDnasKeyRequest = envelope.payload()?;

    // The spender must hold voting power in the DAO.
    verify_membership(&state, &sender, &request.dao).await?;

    // Resolve the credential owner's profile; `keyOwner` may be a public
    // key hex or an address hex.
    let Some(owner) = resolve_key_owner(&state, &request.key_owner)? else {
        return Err(ApiError::internal(
            "Key owner has not registered a profile for DNAS support.",
        ));
    };

    let dnas = DnasKeyRepository::new(&state.db);
    if dnas
        .get(owner.id, &sender.auth.chain_id, &request.dao)?
        .is_none()
    {
        return Err(ApiError::internal(
            "Key owner has no DNAS API key for this DAO.",
        ));
    }
    let Some(secret) = dnas.secret(owner.id, &sender.auth.chain_id, &request.dao)? else {
        return Err(ApiError::internal("Unable to resolve API key."));
    };

    // Stored values are base64; the pinning API wants the raw token.
    let token = BASE64
        .decode(secret.as_bytes())
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| ApiError::internal("Stored API key is malformed."))?;

    tracing::info!(
        dao = %request.dao,
        spender = %sender.signer,
        files = files.len(),
        "Relaying upload with delegated DNAS credential"
    );

    match state.pinner.upload_files(&token, files).await {
        Ok(PinUpload::Pinned(data)) => Ok(Json(UseDnasKeyResponse { data })),
        Ok(PinUpload::Rejected { status, message }) => Err(ApiError::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            message,
        )),
        Err(err) => Err(ApiError::internal(format!("Network error: {err}"))),
    }
}

/// Pull the signed envelope and the file parts out of the multipart body.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(SignedEnvelope, Vec<RelayFile>), ApiError> {
    let mut envelope: Option<SignedEnvelope> = None;
    let mut files: Vec<RelayFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("auth") | Some("sign") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid auth field: {e}")))?;
                envelope = Some(SignedEnvelope::from_json_str(&raw)?);
            }
            Some("files") => {
                let name = field.file_name().unwrap_or("file").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file field: {e}")))?;
                files.push(RelayFile {
                    name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let envelope = envelope.ok_or_else(|| {
        ApiError::bad_request("Missing auth context indexed with \"auth\" in form data")
    })?;
    if files.is_empty() {
        return Err(ApiError::bad_request(
            "No files found in the request. Please include at least one file.",
        ));
    }
    Ok((envelope, files))
}

/// Look up a profile by public key hex first, then by address hex.
fn resolve_key_owner(
    state: &AppState,
    key_owner: &str,
) -> Result<Option<ProfileRecord>, ApiError> {
    let profiles = ProfileRepository::new(&state.db);
    if let Some((profile, _)) = profiles.get_by_public_key_hex(key_owner)? {
        return Ok(Some(profile));
    }
    if let Some((profile, _)) = profiles.get_by_address_hex(key_owner)? {
        return Ok(Some(profile));
    }
    Ok(None)
}
