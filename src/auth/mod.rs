// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Off-chain signed-envelope authentication. Clients wrap each mutation in
//! `{data: {auth, ...payload}, signature}` where `auth` names the signing
//! public key, the chain parameters used for the amino sign-doc, and the
//! profile nonce. The server rebuilds the sign-doc from `data` and verifies
//! the signature against the embedded key.
//!
//! ## Auth Flow
//!
//! 1. Client fetches the profile nonce (`GET /nonce/{publicKey}`)
//! 2. Client signs the request payload with its wallet (amino `signArbitrary`)
//! 3. Server:
//!    - validates the `auth` block structure (400 on missing fields)
//!    - parses the public key and derives the bech32 signer address
//!    - reconstructs the canonical sign-doc and verifies the signature (401)
//!    - hands the verified sender to the handler, which enforces the nonce
//!
//! Replay protection is the per-profile monotonic nonce; a verified envelope
//! is only accepted while `auth.nonce` equals the stored value.

pub mod envelope;
pub mod error;

pub use envelope::{Auth, SignedEnvelope, VerifiedSender};
pub use error::AuthError;

#[cfg(test)]
pub(crate) mod test_support;
