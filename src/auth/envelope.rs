// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed request envelopes.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::AuthError;
use crate::chain::{serialize_sign_doc, ChainPublicKey};

/// The `auth` block every signed payload carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Auth {
    /// Amino msg type the wallet signed with (e.g. `sign/MsgSignData`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Expected profile nonce.
    pub nonce: u64,
    /// Chain the request was signed on.
    pub chain_id: String,
    /// Fee denom used in the zero-fee sign-doc.
    pub chain_fee_denom: String,
    /// Bech32 prefix the signer address is rendered with.
    pub chain_bech32_prefix: String,
    /// Type URL of the signing public key.
    pub public_key_type: String,
    /// Hex of the signing public key.
    pub public_key_hex: String,
}

/// A signed request body: `{data: {auth, ...payload}, signature}`.
///
/// `data` is kept as a raw JSON value so the sign-doc can be rebuilt from
/// the exact field order the client serialized (and signed).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignedEnvelope {
    pub data: Value,
    pub signature: String,
}

/// The identity attached to a request after successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedSender {
    pub auth: Auth,
    pub public_key: ChainPublicKey,
    /// Bech32 signer address for `auth.chain_bech32_prefix`.
    pub signer: String,
}

impl SignedEnvelope {
    /// Parse an envelope from a JSON string (multipart `auth` field).
    pub fn from_json_str(raw: &str) -> Result<Self, AuthError> {
        serde_json::from_str(raw).map_err(|_| AuthError::InvalidAuthBody)
    }

    /// Extract and validate the `auth` block.
    pub fn auth(&self) -> Result<Auth, AuthError> {
        let auth = self
            .data
            .as_object()
            .and_then(|data| data.get("auth"))
            .ok_or(AuthError::InvalidAuthBody)?;
        serde_json::from_value(auth.clone()).map_err(|_| AuthError::InvalidAuthBody)
    }

    /// Deserialize the payload fields of `data` into a typed request.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))
    }

    /// Verify the envelope signature and return the sender identity.
    ///
    /// Pure check: rebuilds the amino sign-doc from `data` and verifies the
    /// signature against the public key named in `auth`. Nonce enforcement
    /// happens later, against the stored profile.
    pub fn verify(&self) -> Result<VerifiedSender, AuthError> {
        let auth = self.auth()?;
        verify_auth_over(&auth, &self.data, &self.signature)
    }
}

/// Verify `signature` over the sign-doc for `data`, as described by `auth`.
///
/// Shared by the top-level envelope and the nested per-key authorizations in
/// `POST /register`, which are envelopes in their own right.
pub fn verify_auth_over(
    auth: &Auth,
    data: &Value,
    signature: &str,
) -> Result<VerifiedSender, AuthError> {
    if signature.is_empty() {
        return Err(AuthError::Unauthorized);
    }

    let public_key = ChainPublicKey::from_hex(&auth.public_key_type, &auth.public_key_hex)?;
    let signer = public_key.bech32_address(&auth.chain_bech32_prefix)?;

    let sign_doc = serialize_sign_doc(
        &auth.kind,
        &signer,
        data,
        &auth.chain_id,
        &auth.chain_fee_denom,
    );

    public_key.verify(sign_doc.as_bytes(), signature)?;

    Ok(VerifiedSender {
        auth: auth.clone(),
        public_key,
        signer,
    })
}
