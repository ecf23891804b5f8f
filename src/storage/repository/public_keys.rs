// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public key repository.
//!
//! A public key belongs to exactly one profile. Attaching a key that is
//! already registered elsewhere moves it: the key leaves its old profile
//! first, and if it was that profile's last key the whole profile is
//! deleted (cascading its preferences and DNAS rows). The move runs in a
//! single write transaction.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};

use super::super::db::{
    prefix_end, profile_prefix, profile_scoped_key, ProfileDb, StorageResult, CHAIN_PREFERENCES,
    PROFILE_KEYS, PUBLIC_KEYS, PUBLIC_KEYS_BY_ADDRESS,
};
use super::profiles::delete_profile_cascade;
use crate::chain::ChainPublicKey;

/// Public key row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    pub profile_id: u64,
    /// Type URL of the key.
    pub key_type: String,
    /// Lowercase compressed key hex; globally unique.
    pub public_key_hex: String,
    /// Lowercase hex of the derived account address.
    pub address_hex: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for public key rows and chain preferences.
pub struct PublicKeyRepository<'a> {
    db: &'a ProfileDb,
}

impl<'a> PublicKeyRepository<'a> {
    pub fn new(db: &'a ProfileDb) -> Self {
        Self { db }
    }

    /// Get a key row by its hex.
    pub fn get_by_hex(&self, public_key_hex: &str) -> StorageResult<Option<PublicKeyRecord>> {
        let read_txn = self.db.db.begin_read()?;
        let keys = read_txn.open_table(PUBLIC_KEYS)?;
        match keys.get(public_key_hex.to_lowercase().as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All keys attached to a profile.
    pub fn list_for_profile(&self, profile_id: u64) -> StorageResult<Vec<PublicKeyRecord>> {
        let prefix = profile_prefix(profile_id);
        let end = prefix_end(&prefix);

        let read_txn = self.db.db.begin_read()?;
        let profile_keys = read_txn.open_table(PROFILE_KEYS)?;

        let mut hexes = Vec::new();
        for entry in profile_keys.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
            let (_, hex) = entry?;
            hexes.push(hex.value().to_string());
        }
        drop(profile_keys);

        let keys = read_txn.open_table(PUBLIC_KEYS)?;
        let mut records = Vec::new();
        for hex in hexes {
            if let Some(value) = keys.get(hex.as_str())? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    /// The key a profile prefers on a chain, if any.
    pub fn preferred_for_chain(
        &self,
        profile_id: u64,
        chain_id: &str,
    ) -> StorageResult<Option<PublicKeyRecord>> {
        let read_txn = self.db.db.begin_read()?;
        let preferences = read_txn.open_table(CHAIN_PREFERENCES)?;
        let Some(hex) = preferences
            .get(profile_scoped_key(profile_id, &[chain_id]).as_slice())?
            .map(|v| v.value().to_string())
        else {
            return Ok(None);
        };
        drop(preferences);

        let keys = read_txn.open_table(PUBLIC_KEYS)?;
        match keys.get(hex.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All chain preferences of a profile as `(chain_id, key row)` pairs.
    pub fn preferences_for_profile(
        &self,
        profile_id: u64,
    ) -> StorageResult<Vec<(String, PublicKeyRecord)>> {
        let prefix = profile_prefix(profile_id);
        let end = prefix_end(&prefix);

        let read_txn = self.db.db.begin_read()?;
        let preferences = read_txn.open_table(CHAIN_PREFERENCES)?;

        let mut pairs = Vec::new();
        for entry in preferences.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
            let (key, hex) = entry?;
            let chain_id = String::from_utf8_lossy(&key.value()[9..]).to_string();
            pairs.push((chain_id, hex.value().to_string()));
        }
        drop(preferences);

        let keys = read_txn.open_table(PUBLIC_KEYS)?;
        let mut result = Vec::new();
        for (chain_id, hex) in pairs {
            if let Some(value) = keys.get(hex.as_str())? {
                result.push((chain_id, serde_json::from_slice(value.value())?));
            }
        }
        Ok(result)
    }

    /// Attach a key to a profile, moving it from its current owner if needed,
    /// and set chain preferences for it.
    pub fn attach(
        &self,
        profile_id: u64,
        key: &ChainPublicKey,
        chain_ids: &[String],
    ) -> StorageResult<()> {
        let key_hex = key.hex().to_lowercase();
        let now = Utc::now();

        let write_txn = self.db.db.begin_write()?;
        {
            let current: Option<PublicKeyRecord> = {
                let keys = write_txn.open_table(PUBLIC_KEYS)?;
                let current = match keys.get(key_hex.as_str())? {
                    Some(value) => Some(serde_json::from_slice(value.value())?),
                    None => None,
                };
                current
            };

            match current {
                Some(row) if row.profile_id == profile_id => {}
                Some(row) => {
                    // Registered to another profile: take it away first.
                    let remaining =
                        detach_key_in_txn(&write_txn, row.profile_id, &key_hex, &row.address_hex)?;
                    if remaining == 0 {
                        delete_profile_cascade(&write_txn, row.profile_id)?;
                    }
                    insert_key_in_txn(&write_txn, profile_id, key, &key_hex, now)?;
                }
                None => {
                    insert_key_in_txn(&write_txn, profile_id, key, &key_hex, now)?;
                }
            }

            let mut preferences = write_txn.open_table(CHAIN_PREFERENCES)?;
            for chain_id in chain_ids {
                preferences.insert(
                    profile_scoped_key(profile_id, &[chain_id]).as_slice(),
                    key_hex.as_str(),
                )?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove keys from a profile.
    ///
    /// Removing every key the profile has deletes the profile itself, since
    /// nothing could ever authenticate as it again.
    pub fn remove(&self, profile_id: u64, keys: &[(String, String)]) -> StorageResult<()> {
        let write_txn = self.db.db.begin_write()?;
        {
            let owned = {
                let profile_keys = write_txn.open_table(PROFILE_KEYS)?;
                let prefix = profile_prefix(profile_id);
                let end = prefix_end(&prefix);
                let mut hexes = Vec::new();
                for entry in profile_keys.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
                    let (_, hex) = entry?;
                    hexes.push(hex.value().to_string());
                }
                hexes
            };

            let targets: Vec<String> = keys
                .iter()
                .map(|(_, hex)| hex.to_lowercase())
                .collect();

            let removes_all = !owned.is_empty()
                && owned.iter().all(|hex| targets.contains(hex));

            if removes_all {
                delete_profile_cascade(&write_txn, profile_id)?;
            } else {
                for hex in owned.iter().filter(|hex| targets.contains(hex)) {
                    let address_hex = {
                        let keys_table = write_txn.open_table(PUBLIC_KEYS)?;
                        let found = keys_table.get(hex.as_str())?.map(|value| {
                            serde_json::from_slice::<PublicKeyRecord>(value.value())
                                .map(|row| row.address_hex)
                        });
                        found
                    };
                    if let Some(address_hex) = address_hex {
                        detach_key_in_txn(&write_txn, profile_id, hex, &address_hex?)?;
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// Insert a key row plus its indexes.
fn insert_key_in_txn(
    write_txn: &redb::WriteTransaction,
    profile_id: u64,
    key: &ChainPublicKey,
    key_hex: &str,
    now: DateTime<Utc>,
) -> StorageResult<()> {
    let record = PublicKeyRecord {
        profile_id,
        key_type: key.key_type().as_str().to_string(),
        public_key_hex: key_hex.to_string(),
        address_hex: key.address_hex(),
        created_at: now,
        updated_at: now,
    };

    let mut keys = write_txn.open_table(PUBLIC_KEYS)?;
    keys.insert(key_hex, serde_json::to_vec(&record)?.as_slice())?;
    drop(keys);

    let mut addresses = write_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
    addresses.insert(record.address_hex.as_str(), key_hex)?;
    drop(addresses);

    let mut profile_keys = write_txn.open_table(PROFILE_KEYS)?;
    profile_keys.insert(
        profile_scoped_key(profile_id, &[key_hex]).as_slice(),
        key_hex,
    )?;
    Ok(())
}

/// Remove a key row, its indexes, and preferences pointing at it.
///
/// Returns how many keys the profile has left.
fn detach_key_in_txn(
    write_txn: &redb::WriteTransaction,
    profile_id: u64,
    key_hex: &str,
    address_hex: &str,
) -> StorageResult<u64> {
    let mut keys = write_txn.open_table(PUBLIC_KEYS)?;
    keys.remove(key_hex)?;
    drop(keys);

    let mut addresses = write_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
    addresses.remove(address_hex)?;
    drop(addresses);

    let mut profile_keys = write_txn.open_table(PROFILE_KEYS)?;
    profile_keys.remove(profile_scoped_key(profile_id, &[key_hex]).as_slice())?;

    let prefix = profile_prefix(profile_id);
    let end = prefix_end(&prefix);
    let mut remaining = 0u64;
    for entry in profile_keys.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
        entry?;
        remaining += 1;
    }
    drop(profile_keys);

    // Preferences referencing the removed key go with it.
    let mut preferences = write_txn.open_table(CHAIN_PREFERENCES)?;
    let mut stale = Vec::new();
    for entry in preferences.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
        let (key, hex) = entry?;
        if hex.value() == key_hex {
            stale.push(key.value().to_vec());
        }
    }
    for key in &stale {
        preferences.remove(key.as_slice())?;
    }

    Ok(remaining)
}
