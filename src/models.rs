// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `Serialize`/`Deserialize` and `ToSchema`
//! for automatic JSON handling and OpenAPI documentation.
//!
//! Wire casing is camelCase throughout, matching what wallets sign.
//!
//! ## Model Categories
//!
//! - **Profiles**: fetched/resolved profile shapes and the update request
//! - **Public keys**: registration (nested signed authorizations) and
//!   unregistration
//! - **DNAS keys**: credential registration, update, removal, and the
//!   relay request/response

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::auth::SignedEnvelope;
use crate::storage::{DnasKeyRecord, ProfileNft};

// =============================================================================
// Shared
// =============================================================================

/// A public key as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicKeyJson {
    /// Type URL of the key.
    #[serde(rename = "type")]
    pub kind: String,
    /// Key data hexstring.
    pub hex: String,
}

/// Generic `{success: true}` response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// =============================================================================
// Profile Fetching
// =============================================================================

/// Per-chain account info inside a fetched profile.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChainAccount {
    /// The key this profile presents on the chain.
    pub public_key: PublicKeyJson,
    /// Bech32 address of that key on the chain.
    pub address: String,
    /// DNAS credentials registered on this chain, keyed by DAO address.
    pub dnas: BTreeMap<String, DnasKeyInfo>,
}

/// Public view of a DNAS credential row (no value, hash only).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnasKeyInfo {
    pub chain_id: String,
    pub api_key_hash: String,
    /// Bech32 address of the member key that registered the credential.
    pub key_owner: String,
    pub key_metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limit: Option<String>,
}

impl From<&DnasKeyRecord> for DnasKeyInfo {
    fn from(row: &DnasKeyRecord) -> Self {
        Self {
            chain_id: row.chain_id.clone(),
            api_key_hash: row.api_key_hash.clone(),
            key_owner: row.key_owner.clone(),
            key_metadata: row.key_metadata.clone(),
            upload_limit: row.upload_limit.clone(),
        }
    }
}

/// Profile NFT with its image resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNftWithImage {
    pub chain_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub image_url: String,
}

/// Body of the fetch-profile response.
///
/// Unknown keys and addresses fetch as the empty profile (empty uuid,
/// initial nonce) rather than a 404.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FetchedProfile {
    pub uuid: String,
    pub nonce: u64,
    pub name: Option<String>,
    pub nft: Option<ProfileNftWithImage>,
    /// Map of chain ID to the account presented on that chain.
    pub chains: BTreeMap<String, ProfileChainAccount>,
}

impl FetchedProfile {
    /// The profile returned for keys that never registered.
    pub fn empty() -> Self {
        Self {
            uuid: String::new(),
            nonce: 0,
            name: None,
            nft: None,
            chains: BTreeMap::new(),
        }
    }
}

/// Profile shape returned by search and resolve.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProfile {
    pub uuid: String,
    pub public_key: PublicKeyJson,
    pub address: String,
    pub name: Option<String>,
    pub nft: Option<ProfileNftWithImage>,
}

/// Body of the search response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchProfilesResponse {
    pub profiles: Vec<ResolvedProfile>,
}

/// Body of the resolve response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveProfileResponse {
    pub resolved: ResolvedProfile,
}

/// Body of the nonce response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NonceResponse {
    pub nonce: u64,
}

/// Body of the stats response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub profiles: u64,
    pub public_keys: u64,
    pub dnas_keys: u64,
}

// =============================================================================
// Profile Update
// =============================================================================

/// Partial profile fields in an update request. `nonce` is required;
/// omitting `name`/`nft` leaves them untouched, while an explicit `null`
/// clears them.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileFields {
    pub nonce: u64,
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub nft: Option<Option<ProfileNft>>,
}

/// Payload of `POST /` (inside the signed envelope's `data`).
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub profile: UpdateProfileFields,
    /// Chains to prefer the signing key on. Defaults to the signing chain
    /// when the profile is first created.
    #[serde(default)]
    pub chain_ids: Option<Vec<String>>,
}

/// Distinguishes a missing field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

// =============================================================================
// Public Key Registration
// =============================================================================

/// Payload of `POST /register` (inside the signed envelope's `data`).
///
/// Each entry is itself a signed envelope produced by the key being
/// registered, whose payload names the registering key in `allow`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPublicKeysRequest {
    #[schema(value_type = Vec<Object>)]
    pub public_keys: Vec<SignedEnvelope>,
}

/// Payload of one nested key authorization.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterKeyAuthorization {
    /// Public key hex that is allowed to register this key.
    pub allow: String,
    /// Chains to prefer this key on.
    #[serde(default)]
    pub chain_ids: Option<Vec<String>>,
}

/// Payload of `POST /unregister`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterPublicKeysRequest {
    pub public_keys: Vec<PublicKeyJson>,
}

// =============================================================================
// DNAS Keys
// =============================================================================

/// Credential fields carried by DNAS registration and update entries.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnasKeyFields {
    /// JSON-encoded metadata about the credential.
    #[serde(default)]
    pub key_metadata: Option<String>,
    /// Optional MB limit for monthly use.
    #[serde(default)]
    pub upload_limit: Option<String>,
    /// Base64 credential value.
    pub api_key_value: String,
}

/// Payload of `POST /register-dnas` (inside the signed envelope's `data`).
///
/// Each entry is itself a signed envelope whose payload carries the DAO and
/// the credential; the entry's signer must be a member of that DAO.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDnasKeysRequest {
    #[schema(value_type = Vec<Object>)]
    pub dnas_api_keys: Vec<SignedEnvelope>,
}

/// Payload of one nested DNAS registration.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnasKeyRegistration {
    /// DAO address the credential is scoped to.
    pub dao: String,
    pub dnas: DnasKeyFields,
}

/// One entry of `POST /update-dnas`: a `null` credential removes the row.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDnasKeyEntry {
    pub dao_addr: String,
    /// Defaults to the chain the envelope was signed on.
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dnas_key: Option<DnasKeyFields>,
}

/// Payload of `POST /update-dnas`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateDnasKeysRequest {
    pub dnas: Vec<UpdateDnasKeyEntry>,
}

/// Payload of `POST /unregister-dnas`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UnregisterDnasKeysRequest {
    /// DAO addresses, plain or in `chainId:daoAddr` form.
    pub daos: Vec<String>,
}

/// Body of the daoKeys response: DNAS credentials registered for a DAO,
/// keyed by the owner's address hex.
pub type FetchedDaoKeys = BTreeMap<String, DnasKeyInfo>;

// =============================================================================
// Credential Relay
// =============================================================================

/// Payload of the `auth` part in a `POST /use-dnas` multipart request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UseDnasKeyRequest {
    /// DAO whose credential is being spent.
    pub dao: String,
    /// Identifies the credential owner: public key hex or address hex.
    pub key_owner: String,
}

/// One successfully pinned file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PinnedFile {
    pub success: bool,
    /// Content identifier assigned by the pinning service.
    pub cid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Body of a successful `POST /use-dnas` response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UseDnasKeyResponse {
    pub data: Vec<PinnedFile>,
}
