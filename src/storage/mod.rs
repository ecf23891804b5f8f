// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Profile Storage Module
//!
//! Persistent storage for profiles, public keys, chain preferences, and
//! DNAS credentials, backed by an embedded redb database (pure Rust, ACID).
//!
//! ## Layout
//!
//! - [`db`] owns the database handle, table definitions, and composite-key
//!   helpers
//! - [`repository`] provides typed per-entity access on top of it
//!
//! ## Important Notes
//!
//! - DNAS credential values live in their own table and are only read by the
//!   relay; no repository method serializes them into API rows
//! - Uniqueness (one profile per key hex, one DNAS row per
//!   (profile, chain, dao)) is enforced by the table key shapes themselves,
//!   inside single write transactions

pub mod db;
pub mod repository;

pub use db::{ProfileDb, StorageError, StorageResult};
pub use repository::{
    DnasKeyRecord, DnasKeyRepository, ProfileNft, ProfileRecord, ProfileRepository,
    PublicKeyRecord, PublicKeyRepository,
};
