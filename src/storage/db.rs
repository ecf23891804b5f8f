// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded profile database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `meta`: counter name → next value (surrogate profile ids)
//! - `profiles`: profile_id → serialized ProfileRecord
//! - `profiles_by_name`: lowercase name → profile_id
//! - `public_keys`: lowercase key hex → serialized PublicKeyRecord
//! - `public_keys_by_address`: lowercase address hex → key hex
//! - `profile_keys`: composite key (profile_id_be|key_hex) → key hex
//! - `chain_preferences`: composite key (profile_id_be|chain_id) → key hex
//! - `dnas_keys`: composite key (profile_id_be|chain_id|dao_addr) → record
//! - `dnas_secrets`: same composite key → base64 credential value
//! - `dnas_by_dao`: composite key (dao|profile_id_be|chain_id) → dao_addr,
//!   written once for the bech32 DAO address and once for its hex data part

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub(super) const PROFILES: TableDefinition<u64, &[u8]> = TableDefinition::new("profiles");

pub(super) const PROFILES_BY_NAME: TableDefinition<&str, u64> =
    TableDefinition::new("profiles_by_name");

pub(super) const PUBLIC_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("public_keys");

pub(super) const PUBLIC_KEYS_BY_ADDRESS: TableDefinition<&str, &str> =
    TableDefinition::new("public_keys_by_address");

pub(super) const PROFILE_KEYS: TableDefinition<&[u8], &str> = TableDefinition::new("profile_keys");

pub(super) const CHAIN_PREFERENCES: TableDefinition<&[u8], &str> =
    TableDefinition::new("chain_preferences");

pub(super) const DNAS_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("dnas_keys");

pub(super) const DNAS_SECRETS: TableDefinition<&[u8], &str> = TableDefinition::new("dnas_secrets");

pub(super) const DNAS_BY_DAO: TableDefinition<&[u8], &[u8]> = TableDefinition::new("dnas_by_dao");

/// Counter key for profile surrogate ids.
pub(super) const NEXT_PROFILE_ID: &str = "next_profile_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Composite Key Helpers
// =============================================================================

/// Build a composite key from string parts after a big-endian profile id.
///
/// Format: `profile_id_be | part | part ...` with `|` separators. Profile ids
/// are fixed-width so prefix scans over one profile never bleed into another.
pub(super) fn profile_scoped_key(profile_id: u64, parts: &[&str]) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + parts.iter().map(|p| p.len() + 1).sum::<usize>());
    key.extend_from_slice(&profile_id.to_be_bytes());
    for part in parts {
        key.push(b'|');
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// Prefix for scanning all composite keys of a profile.
pub(super) fn profile_prefix(profile_id: u64) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(9);
    prefix.extend_from_slice(&profile_id.to_be_bytes());
    prefix.push(b'|');
    prefix
}

/// Composite key for the dnas_by_dao index: `dao | profile_id_be | chain_id`.
pub(super) fn dao_scoped_key(dao: &str, profile_id: u64, chain_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(dao.len() + 1 + 8 + 1 + chain_id.len());
    key.extend_from_slice(dao.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&profile_id.to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(chain_id.as_bytes());
    key
}

/// Prefix for scanning all index entries of a DAO address.
pub(super) fn dao_prefix(dao: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(dao.len() + 1);
    prefix.extend_from_slice(dao.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a prefix range scan.
pub(super) fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    end.extend_from_slice(&[0xFF; 16]);
    end
}

// =============================================================================
// ProfileDb
// =============================================================================

/// Embedded ACID profile database.
pub struct ProfileDb {
    pub(super) db: Database,
}

impl ProfileDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(META)?;
            let _ = write_txn.open_table(PROFILES)?;
            let _ = write_txn.open_table(PROFILES_BY_NAME)?;
            let _ = write_txn.open_table(PUBLIC_KEYS)?;
            let _ = write_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
            let _ = write_txn.open_table(PROFILE_KEYS)?;
            let _ = write_txn.open_table(CHAIN_PREFERENCES)?;
            let _ = write_txn.open_table(DNAS_KEYS)?;
            let _ = write_txn.open_table(DNAS_SECRETS)?;
            let _ = write_txn.open_table(DNAS_BY_DAO)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Allocate the next profile surrogate id.
    pub(super) fn allocate_profile_id(
        write_txn: &redb::WriteTransaction,
    ) -> StorageResult<u64> {
        let mut meta = write_txn.open_table(META)?;
        let next = meta.get(NEXT_PROFILE_ID)?.map(|v| v.value()).unwrap_or(1);
        meta.insert(NEXT_PROFILE_ID, next + 1)?;
        Ok(next)
    }

    /// Entity counts for the stats endpoint:
    /// `(profiles, public keys, dnas keys)`.
    pub fn counts(&self) -> StorageResult<(u64, u64, u64)> {
        let read_txn = self.db.begin_read()?;
        let profiles = read_txn.open_table(PROFILES)?.len()?;
        let keys = read_txn.open_table(PUBLIC_KEYS)?.len()?;
        let dnas = read_txn.open_table(DNAS_KEYS)?.len()?;
        Ok((profiles, keys, dnas))
    }
}
