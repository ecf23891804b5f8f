// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test-only signing helpers: deterministic secp256k1 identities that
//! produce real signed envelopes, so tests exercise the same verification
//! path as production traffic.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::envelope::{Auth, SignedEnvelope};
use crate::chain::{serialize_sign_doc, ChainPublicKey, PublicKeyType};

pub const TEST_CHAIN_ID: &str = "juno-1";
pub const TEST_FEE_DENOM: &str = "ujuno";
pub const TEST_BECH32_PREFIX: &str = "juno";
pub const TEST_MSG_TYPE: &str = "sign/MsgSignData";

/// Deterministic signing key for a test seed.
pub fn test_signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).expect("non-zero seed is a valid scalar")
}

/// A deterministic test identity that can sign envelopes.
pub struct TestSigner {
    signing: SigningKey,
}

impl TestSigner {
    pub fn new(seed: u8) -> Self {
        Self {
            signing: test_signing_key(seed),
        }
    }

    /// Compressed public key hex.
    pub fn public_key_hex(&self) -> String {
        hex::encode(
            self.signing
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes(),
        )
    }

    pub fn chain_public_key(&self) -> ChainPublicKey {
        ChainPublicKey::from_hex(PublicKeyType::COSMOS_SECP256K1, &self.public_key_hex())
            .expect("test key parses")
    }

    pub fn address_hex(&self) -> String {
        self.chain_public_key().address_hex()
    }

    pub fn bech32_address(&self) -> String {
        self.chain_public_key()
            .bech32_address(TEST_BECH32_PREFIX)
            .expect("test prefix renders")
    }

    /// Auth block for this identity on the test chain.
    pub fn auth(&self, nonce: u64) -> Auth {
        Auth {
            kind: TEST_MSG_TYPE.to_string(),
            nonce,
            chain_id: TEST_CHAIN_ID.to_string(),
            chain_fee_denom: TEST_FEE_DENOM.to_string(),
            chain_bech32_prefix: TEST_BECH32_PREFIX.to_string(),
            public_key_type: PublicKeyType::COSMOS_SECP256K1.to_string(),
            public_key_hex: self.public_key_hex(),
        }
    }

    /// Sign a payload the way a wallet would: amino sign-doc, sha256, r||s.
    pub fn sign_data(&self, data: &Value) -> String {
        let auth: Auth = serde_json::from_value(data["auth"].clone()).expect("auth block");
        let sign_doc = serialize_sign_doc(
            &auth.kind,
            &self.bech32_address(),
            data,
            &auth.chain_id,
            &auth.chain_fee_denom,
        );
        let digest: [u8; 32] = Sha256::digest(sign_doc.as_bytes()).into();
        let signature: Signature = self.signing.sign_prehash(&digest).expect("signing");
        BASE64.encode(signature.to_bytes())
    }
}

/// Build a complete signed envelope: `{data: {auth, ...extra}, signature}`.
pub fn signed_envelope(signer: &TestSigner, nonce: u64, extra: Value) -> SignedEnvelope {
    let mut data = json!({ "auth": serde_json::to_value(signer.auth(nonce)).unwrap() });
    if let (Some(target), Some(source)) = (data.as_object_mut(), extra.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
    let signature = signer.sign_data(&data);
    SignedEnvelope { data, signature }
}
