// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DNAS credential repository.
//!
//! One row per (profile, chain, DAO), enforced by the composite table key.
//! The credential value itself lives base64-encoded in a separate secrets
//! table and is only read back by the relay; rows carry a sha256 hash of it
//! for display. A per-DAO index is written under both the DAO's bech32
//! address and the hex of its data part, so either spelling resolves.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::super::db::{
    dao_prefix, dao_scoped_key, prefix_end, profile_prefix, profile_scoped_key, ProfileDb,
    StorageResult, DNAS_BY_DAO, DNAS_KEYS, DNAS_SECRETS,
};
use crate::chain::pubkey::bech32_to_bytes;

/// DNAS credential row. Never carries the credential value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnasKeyRecord {
    pub profile_id: u64,
    /// Chain the DAO lives on.
    pub chain_id: String,
    /// DAO address the credential is scoped to (bech32).
    pub dao_addr: String,
    /// Bech32 address of the member key that registered the credential.
    pub key_owner: String,
    /// JSON-encoded metadata about the credential.
    pub key_metadata: String,
    /// Optional MB limit for monthly use.
    pub upload_limit: Option<String>,
    /// Lowercase sha256 hex of the stored credential value.
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for DNAS credential rows and their secret values.
pub struct DnasKeyRepository<'a> {
    db: &'a ProfileDb,
}

impl<'a> DnasKeyRepository<'a> {
    pub fn new(db: &'a ProfileDb) -> Self {
        Self { db }
    }

    /// Insert or update the credential for (profile, chain, dao).
    #[allow(clippy::too_many_arguments)]
    pub fn upsert(
        &self,
        profile_id: u64,
        chain_id: &str,
        dao_addr: &str,
        key_owner: &str,
        key_metadata: &str,
        upload_limit: Option<String>,
        api_key_value: &str,
    ) -> StorageResult<DnasKeyRecord> {
        let now = Utc::now();
        let row_key = profile_scoped_key(profile_id, &[chain_id, dao_addr]);

        let write_txn = self.db.db.begin_write()?;
        let record = {
            let mut rows = write_txn.open_table(DNAS_KEYS)?;
            let created_at = match rows.get(row_key.as_slice())? {
                Some(existing) => {
                    serde_json::from_slice::<DnasKeyRecord>(existing.value())?.created_at
                }
                None => now,
            };

            let record = DnasKeyRecord {
                profile_id,
                chain_id: chain_id.to_string(),
                dao_addr: dao_addr.to_string(),
                key_owner: key_owner.to_string(),
                key_metadata: key_metadata.to_string(),
                upload_limit,
                api_key_hash: hex::encode(Sha256::digest(api_key_value.as_bytes())),
                created_at,
                updated_at: now,
            };
            rows.insert(row_key.as_slice(), serde_json::to_vec(&record)?.as_slice())?;
            drop(rows);

            let mut secrets = write_txn.open_table(DNAS_SECRETS)?;
            secrets.insert(row_key.as_slice(), api_key_value)?;
            drop(secrets);

            let mut by_dao = write_txn.open_table(DNAS_BY_DAO)?;
            for dao in dao_index_names(dao_addr) {
                by_dao.insert(
                    dao_scoped_key(&dao, profile_id, chain_id).as_slice(),
                    row_key.as_slice(),
                )?;
            }

            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Get the row for (profile, chain, dao).
    pub fn get(
        &self,
        profile_id: u64,
        chain_id: &str,
        dao_addr: &str,
    ) -> StorageResult<Option<DnasKeyRecord>> {
        let read_txn = self.db.db.begin_read()?;
        let rows = read_txn.open_table(DNAS_KEYS)?;
        match rows.get(profile_scoped_key(profile_id, &[chain_id, dao_addr]).as_slice())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All DNAS rows of a profile.
    pub fn list_for_profile(&self, profile_id: u64) -> StorageResult<Vec<DnasKeyRecord>> {
        let prefix = profile_prefix(profile_id);
        let end = prefix_end(&prefix);

        let read_txn = self.db.db.begin_read()?;
        let rows = read_txn.open_table(DNAS_KEYS)?;
        let mut records = Vec::new();
        for entry in rows.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// All DNAS rows registered for a DAO, addressed by bech32 or hex.
    pub fn list_for_dao(&self, dao: &str) -> StorageResult<Vec<DnasKeyRecord>> {
        let prefix = dao_prefix(dao);
        let end = prefix_end(&prefix);

        let read_txn = self.db.db.begin_read()?;
        let by_dao = read_txn.open_table(DNAS_BY_DAO)?;
        let mut row_keys = Vec::new();
        for entry in by_dao.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
            let (_, row_key) = entry?;
            row_keys.push(row_key.value().to_vec());
        }
        drop(by_dao);

        let rows = read_txn.open_table(DNAS_KEYS)?;
        let mut records = Vec::new();
        for row_key in row_keys {
            if let Some(value) = rows.get(row_key.as_slice())? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    /// Remove a profile's rows for the listed DAOs.
    ///
    /// Entries match on the DAO address alone or on the combined
    /// `chainId:daoAddr` form the register flow uses. Returns how many rows
    /// were removed.
    pub fn remove_for_daos(&self, profile_id: u64, daos: &[String]) -> StorageResult<usize> {
        let rows_to_remove: Vec<DnasKeyRecord> = self
            .list_for_profile(profile_id)?
            .into_iter()
            .filter(|row| {
                daos.iter().any(|dao| {
                    dao == &row.dao_addr || dao == &format!("{}:{}", row.chain_id, row.dao_addr)
                })
            })
            .collect();

        if rows_to_remove.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.db.begin_write()?;
        {
            let mut rows = write_txn.open_table(DNAS_KEYS)?;
            let mut secrets = write_txn.open_table(DNAS_SECRETS)?;
            let mut by_dao = write_txn.open_table(DNAS_BY_DAO)?;
            for row in &rows_to_remove {
                let row_key = profile_scoped_key(profile_id, &[&row.chain_id, &row.dao_addr]);
                rows.remove(row_key.as_slice())?;
                secrets.remove(row_key.as_slice())?;
                for dao in dao_index_names(&row.dao_addr) {
                    by_dao.remove(dao_scoped_key(&dao, profile_id, &row.chain_id).as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(rows_to_remove.len())
    }

    /// Read the stored credential value (base64).
    ///
    /// **Internal use only** - resolved by the relay right before the
    /// outbound upload. NEVER expose this via API.
    pub(crate) fn secret(
        &self,
        profile_id: u64,
        chain_id: &str,
        dao_addr: &str,
    ) -> StorageResult<Option<String>> {
        let read_txn = self.db.db.begin_read()?;
        let secrets = read_txn.open_table(DNAS_SECRETS)?;
        Ok(secrets
            .get(profile_scoped_key(profile_id, &[chain_id, dao_addr]).as_slice())?
            .map(|v| v.value().to_string()))
    }
}

/// Index spellings for a DAO address: the bech32 form plus, when it decodes,
/// the lowercase hex of its data part.
pub(crate) fn dao_index_names(dao_addr: &str) -> Vec<String> {
    let mut names = vec![dao_addr.to_string()];
    if let Ok(bytes) = bech32_to_bytes(dao_addr) {
        names.push(hex::encode(bytes));
    }
    names
}
