// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain public keys: parsing, address derivation, bech32 rendering, and
//! signature verification.
//!
//! Two key types are supported:
//!
//! - `/cosmos.crypto.secp256k1.PubKey` — address is
//!   ripemd160(sha256(compressed key)).
//! - `/injective.crypto.v1beta1.ethsecp256k1.PubKey` — address is the last
//!   20 bytes of keccak256(uncompressed key without the 0x04 tag), and
//!   sign-docs are hashed with keccak256 instead of sha256.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bech32::{ToBase32, Variant};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

/// Known public key type URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyType {
    CosmosSecp256k1,
    InjectiveEthSecp256k1,
}

impl PublicKeyType {
    pub const COSMOS_SECP256K1: &'static str = "/cosmos.crypto.secp256k1.PubKey";
    pub const INJECTIVE_ETH_SECP256K1: &'static str =
        "/injective.crypto.v1beta1.ethsecp256k1.PubKey";

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            Self::COSMOS_SECP256K1 => Some(Self::CosmosSecp256k1),
            Self::INJECTIVE_ETH_SECP256K1 => Some(Self::InjectiveEthSecp256k1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CosmosSecp256k1 => Self::COSMOS_SECP256K1,
            Self::InjectiveEthSecp256k1 => Self::INJECTIVE_ETH_SECP256K1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublicKeyError {
    #[error("Unknown public key type: {0}")]
    UnknownType(String),

    #[error("Invalid public key hex: {0}")]
    InvalidHex(String),

    #[error("Invalid secp256k1 public key: {0}")]
    InvalidKey(String),

    #[error("Invalid bech32 prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Signature verification failed")]
    VerificationFailed,
}

/// A parsed chain public key.
#[derive(Debug, Clone)]
pub struct ChainPublicKey {
    key_type: PublicKeyType,
    key: VerifyingKey,
    hex: String,
}

impl ChainPublicKey {
    /// Parse a public key from its type URL and hex-encoded SEC1 bytes.
    ///
    /// Compressed (33-byte) and uncompressed (65-byte) encodings are both
    /// accepted; the stored hex is normalized to lowercase compressed form.
    pub fn from_hex(type_url: &str, key_hex: &str) -> Result<Self, PublicKeyError> {
        let key_type = PublicKeyType::from_str(type_url)
            .ok_or_else(|| PublicKeyError::UnknownType(type_url.to_string()))?;

        let bytes =
            hex::decode(key_hex).map_err(|e| PublicKeyError::InvalidHex(e.to_string()))?;
        let key = VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|e| PublicKeyError::InvalidKey(e.to_string()))?;

        let compressed = key.to_encoded_point(true);
        Ok(Self {
            key_type,
            key,
            hex: hex::encode(compressed.as_bytes()),
        })
    }

    pub fn key_type(&self) -> PublicKeyType {
        self.key_type
    }

    /// Lowercase hex of the compressed SEC1 encoding.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Raw 20-byte account address derived from this key.
    pub fn address_bytes(&self) -> [u8; 20] {
        match self.key_type {
            PublicKeyType::CosmosSecp256k1 => {
                let compressed = self.key.to_encoded_point(true);
                let sha = Sha256::digest(compressed.as_bytes());
                let ripe = Ripemd160::digest(sha);
                let mut out = [0u8; 20];
                out.copy_from_slice(&ripe);
                out
            }
            PublicKeyType::InjectiveEthSecp256k1 => {
                let uncompressed = self.key.to_encoded_point(false);
                let digest = keccak256(&uncompressed.as_bytes()[1..]);
                let mut out = [0u8; 20];
                out.copy_from_slice(&digest[12..]);
                out
            }
        }
    }

    /// Lowercase hex of the account address.
    pub fn address_hex(&self) -> String {
        hex::encode(self.address_bytes())
    }

    /// Render the account address with a chain's bech32 prefix.
    pub fn bech32_address(&self, prefix: &str) -> Result<String, PublicKeyError> {
        bech32::encode(prefix, self.address_bytes().to_base32(), Variant::Bech32)
            .map_err(|e| PublicKeyError::InvalidPrefix(e.to_string()))
    }

    /// Verify a base64 signature over a serialized sign-doc.
    ///
    /// Accepts both the fixed 64-byte r||s encoding and DER. The message is
    /// hashed with sha256 or keccak256 depending on the key type.
    pub fn verify(&self, message: &[u8], base64_signature: &str) -> Result<(), PublicKeyError> {
        let sig_bytes = BASE64
            .decode(base64_signature)
            .map_err(|e| PublicKeyError::InvalidSignature(e.to_string()))?;

        let signature = if sig_bytes.len() == 64 {
            Signature::from_slice(&sig_bytes)
                .map_err(|e| PublicKeyError::InvalidSignature(e.to_string()))?
        } else {
            Signature::from_der(&sig_bytes)
                .map_err(|e| PublicKeyError::InvalidSignature(e.to_string()))?
        };
        // Some signers emit high-S signatures, which k256 rejects.
        let signature = signature.normalize_s().unwrap_or(signature);

        let digest: [u8; 32] = match self.key_type {
            PublicKeyType::CosmosSecp256k1 => Sha256::digest(message).into(),
            PublicKeyType::InjectiveEthSecp256k1 => keccak256(message),
        };

        self.key
            .verify_prehash(&digest, &signature)
            .map_err(|_| PublicKeyError::VerificationFailed)
    }

    /// Whether this key matches a stored (type, hex) pair.
    pub fn matches(&self, type_url: &str, key_hex: &str) -> bool {
        self.key_type.as_str() == type_url && self.hex.eq_ignore_ascii_case(key_hex)
    }
}

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Decode a bech32 address into its raw data bytes.
pub fn bech32_to_bytes(address: &str) -> Result<Vec<u8>, PublicKeyError> {
    use bech32::FromBase32;

    let (_hrp, data, _variant) =
        bech32::decode(address).map_err(|e| PublicKeyError::InvalidPrefix(e.to_string()))?;
    Vec::<u8>::from_base32(&data).map_err(|e| PublicKeyError::InvalidPrefix(e.to_string()))
}
