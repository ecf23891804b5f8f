// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the profile database.
//!
//! Each repository provides CRUD operations for a specific entity type.
//! Every method runs in its own redb transaction, mirroring the
//! one-statement-at-a-time discipline of the HTTP handlers; multi-table
//! mutations (key moves, cascading deletes) stay atomic inside one write
//! transaction.

pub mod dnas_keys;
pub mod profiles;
pub mod public_keys;

pub use dnas_keys::{DnasKeyRecord, DnasKeyRepository};
pub use profiles::{ProfileNft, ProfileRecord, ProfileRepository};
pub use public_keys::{PublicKeyRecord, PublicKeyRepository};
