// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile repository.
//!
//! A profile is the unit of identity: it owns public keys, chain
//! preferences, and DNAS credentials, and carries the replay nonce every
//! authenticated mutation is checked against. Deleting a profile cascades
//! to everything it owns.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::db::{
    prefix_end, profile_prefix, profile_scoped_key, ProfileDb, StorageError, StorageResult,
    CHAIN_PREFERENCES, DNAS_BY_DAO, DNAS_KEYS, DNAS_SECRETS, PROFILES, PROFILES_BY_NAME,
    PROFILE_KEYS, PUBLIC_KEYS, PUBLIC_KEYS_BY_ADDRESS,
};
use super::dnas_keys::DnasKeyRecord;
use super::public_keys::PublicKeyRecord;
use crate::chain::ChainPublicKey;

/// NFT a profile has selected as its picture.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNft {
    pub chain_id: String,
    pub collection_address: String,
    pub token_id: String,
}

/// Profile row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Surrogate id, internal only.
    pub id: u64,
    /// Public identifier exposed to clients.
    pub uuid: String,
    /// Replay counter; every authenticated mutation must present this value.
    pub nonce: u64,
    /// Optional unique display name.
    pub name: Option<String>,
    /// Optional profile NFT.
    pub nft: Option<ProfileNft>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for profile rows.
pub struct ProfileRepository<'a> {
    db: &'a ProfileDb,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(db: &'a ProfileDb) -> Self {
        Self { db }
    }

    /// Get a profile by surrogate id.
    pub fn get(&self, profile_id: u64) -> StorageResult<Option<ProfileRecord>> {
        let read_txn = self.db.db.begin_read()?;
        let table = read_txn.open_table(PROFILES)?;
        match table.get(profile_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a profile by its unique name (case-insensitive).
    pub fn get_by_name(&self, name: &str) -> StorageResult<Option<ProfileRecord>> {
        let read_txn = self.db.db.begin_read()?;
        let names = read_txn.open_table(PROFILES_BY_NAME)?;
        let Some(id) = names.get(name.to_lowercase().as_str())?.map(|v| v.value()) else {
            return Ok(None);
        };
        drop(names);
        let table = read_txn.open_table(PROFILES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get the profile owning a public key, along with the key row.
    pub fn get_by_public_key_hex(
        &self,
        public_key_hex: &str,
    ) -> StorageResult<Option<(ProfileRecord, PublicKeyRecord)>> {
        let read_txn = self.db.db.begin_read()?;
        let key_row: PublicKeyRecord = {
            let keys = read_txn.open_table(PUBLIC_KEYS)?;
            match keys.get(public_key_hex.to_lowercase().as_str())? {
                Some(raw) => serde_json::from_slice(raw.value())?,
                None => return Ok(None),
            }
        };

        let profiles = read_txn.open_table(PROFILES)?;
        match profiles.get(key_row.profile_id)? {
            Some(value) => Ok(Some((serde_json::from_slice(value.value())?, key_row))),
            None => Ok(None),
        }
    }

    /// Get the profile owning the key with a given address hex.
    pub fn get_by_address_hex(
        &self,
        address_hex: &str,
    ) -> StorageResult<Option<(ProfileRecord, PublicKeyRecord)>> {
        let read_txn = self.db.db.begin_read()?;
        let addresses = read_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
        let Some(key_hex) = addresses
            .get(address_hex.to_lowercase().as_str())?
            .map(|v| v.value().to_string())
        else {
            return Ok(None);
        };
        drop(addresses);
        drop(read_txn);
        self.get_by_public_key_hex(&key_hex)
    }

    /// Nonce for a public key; the initial nonce when no profile exists.
    pub fn nonce_for_public_key(&self, public_key_hex: &str) -> StorageResult<u64> {
        Ok(self
            .get_by_public_key_hex(public_key_hex)?
            .map(|(profile, _)| profile.nonce)
            .unwrap_or(0))
    }

    /// Create a profile owned by `key`, attaching the key and setting chain
    /// preferences in the same transaction.
    pub fn create_with_key(
        &self,
        key: &ChainPublicKey,
        nonce: u64,
        name: Option<String>,
        nft: Option<ProfileNft>,
        chain_ids: &[String],
    ) -> StorageResult<ProfileRecord> {
        let now = Utc::now();
        let key_hex = key.hex().to_lowercase();

        let write_txn = self.db.db.begin_write()?;
        let record = {
            if let Some(name) = &name {
                ensure_name_free(&write_txn, name, None)?;
            }

            let id = ProfileDb::allocate_profile_id(&write_txn)?;
            let record = ProfileRecord {
                id,
                uuid: Uuid::new_v4().to_string(),
                nonce,
                name,
                nft,
                created_at: now,
                updated_at: now,
            };

            let mut profiles = write_txn.open_table(PROFILES)?;
            profiles.insert(id, serde_json::to_vec(&record)?.as_slice())?;
            drop(profiles);

            if let Some(name) = &record.name {
                let mut names = write_txn.open_table(PROFILES_BY_NAME)?;
                names.insert(name.to_lowercase().as_str(), id)?;
            }

            let key_record = PublicKeyRecord {
                profile_id: id,
                key_type: key.key_type().as_str().to_string(),
                public_key_hex: key_hex.clone(),
                address_hex: key.address_hex(),
                created_at: now,
                updated_at: now,
            };
            let mut keys = write_txn.open_table(PUBLIC_KEYS)?;
            keys.insert(
                key_hex.as_str(),
                serde_json::to_vec(&key_record)?.as_slice(),
            )?;
            drop(keys);

            let mut addresses = write_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
            addresses.insert(key_record.address_hex.as_str(), key_hex.as_str())?;
            drop(addresses);

            let mut profile_keys = write_txn.open_table(PROFILE_KEYS)?;
            profile_keys.insert(
                profile_scoped_key(id, &[&key_hex]).as_slice(),
                key_hex.as_str(),
            )?;
            drop(profile_keys);

            let mut preferences = write_txn.open_table(CHAIN_PREFERENCES)?;
            for chain_id in chain_ids {
                preferences.insert(
                    profile_scoped_key(id, &[chain_id]).as_slice(),
                    key_hex.as_str(),
                )?;
            }

            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Update a profile's nonce, name, and NFT.
    ///
    /// `name`/`nft` use the partial-update convention: `None` leaves the
    /// field untouched, `Some(None)` clears it.
    pub fn update(
        &self,
        profile_id: u64,
        nonce: u64,
        name: Option<Option<String>>,
        nft: Option<Option<ProfileNft>>,
    ) -> StorageResult<ProfileRecord> {
        let write_txn = self.db.db.begin_write()?;
        let record = {
            let mut profiles = write_txn.open_table(PROFILES)?;
            let mut record: ProfileRecord = match profiles.get(profile_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Profile {profile_id}"))),
            };
            drop(profiles);

            let old_name = record.name.clone();
            if let Some(new_name) = name {
                if let Some(n) = &new_name {
                    if old_name.as_deref().map(str::to_lowercase)
                        != Some(n.to_lowercase())
                    {
                        ensure_name_free(&write_txn, n, Some(profile_id))?;
                    }
                }
                record.name = new_name;
            }
            if let Some(new_nft) = nft {
                record.nft = new_nft;
            }
            record.nonce = nonce;
            record.updated_at = Utc::now();

            let mut names = write_txn.open_table(PROFILES_BY_NAME)?;
            if old_name != record.name {
                if let Some(old) = &old_name {
                    names.remove(old.to_lowercase().as_str())?;
                }
                if let Some(new) = &record.name {
                    names.insert(new.to_lowercase().as_str(), profile_id)?;
                }
            }
            drop(names);

            let mut profiles = write_txn.open_table(PROFILES)?;
            profiles.insert(profile_id, serde_json::to_vec(&record)?.as_slice())?;

            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Increment the profile nonce by one.
    pub fn increment_nonce(&self, profile_id: u64) -> StorageResult<()> {
        let write_txn = self.db.db.begin_write()?;
        {
            let mut profiles = write_txn.open_table(PROFILES)?;
            let mut record: ProfileRecord = match profiles.get(profile_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(StorageError::NotFound(format!("Profile {profile_id}"))),
            };
            record.nonce += 1;
            record.updated_at = Utc::now();
            profiles.insert(profile_id, serde_json::to_vec(&record)?.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete a profile and everything it owns.
    pub fn delete(&self, profile_id: u64) -> StorageResult<()> {
        let write_txn = self.db.db.begin_write()?;
        delete_profile_cascade(&write_txn, profile_id)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Top profiles by name prefix that have a key preference on `chain_id`.
    pub fn search_by_name_prefix(
        &self,
        name_prefix: &str,
        chain_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<(ProfileRecord, PublicKeyRecord)>> {
        let prefix = name_prefix.to_lowercase();
        let read_txn = self.db.db.begin_read()?;
        let names = read_txn.open_table(PROFILES_BY_NAME)?;

        let mut ids = Vec::new();
        for entry in names.range(prefix.as_str()..)? {
            let (name, id) = entry?;
            if !name.value().starts_with(&prefix) {
                break;
            }
            ids.push(id.value());
        }
        drop(names);
        drop(read_txn);

        let mut results = Vec::new();
        for id in ids {
            if results.len() >= limit {
                break;
            }
            let Some(profile) = self.get(id)? else {
                continue;
            };
            let preferred = super::public_keys::PublicKeyRepository::new(self.db)
                .preferred_for_chain(id, chain_id)?;
            if let Some(key) = preferred {
                results.push((profile, key));
            }
        }
        Ok(results)
    }
}

/// Fail when `name` is already taken by a different profile.
fn ensure_name_free(
    write_txn: &WriteTransaction,
    name: &str,
    current_profile: Option<u64>,
) -> StorageResult<()> {
    let names = write_txn.open_table(PROFILES_BY_NAME)?;
    if let Some(owner) = names.get(name.to_lowercase().as_str())? {
        if Some(owner.value()) != current_profile {
            return Err(StorageError::Conflict("Name already taken.".to_string()));
        }
    }
    Ok(())
}

/// Remove a profile row plus its keys, preferences, DNAS rows, and secrets.
///
/// Runs inside the caller's write transaction so key moves stay atomic.
pub(crate) fn delete_profile_cascade(
    write_txn: &WriteTransaction,
    profile_id: u64,
) -> StorageResult<()> {
    let prefix = profile_prefix(profile_id);
    let end = prefix_end(&prefix);

    // Profile row and name index.
    let mut profiles = write_txn.open_table(PROFILES)?;
    let record: Option<ProfileRecord> = match profiles.remove(profile_id)? {
        Some(value) => Some(serde_json::from_slice(value.value())?),
        None => None,
    };
    drop(profiles);

    if let Some(name) = record.as_ref().and_then(|r| r.name.as_ref()) {
        let mut names = write_txn.open_table(PROFILES_BY_NAME)?;
        names.remove(name.to_lowercase().as_str())?;
    }

    // Public keys and their address index.
    let mut profile_keys = write_txn.open_table(PROFILE_KEYS)?;
    let mut index_keys = Vec::new();
    let mut key_hexes = Vec::new();
    for entry in profile_keys.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
        let (index_key, hex) = entry?;
        index_keys.push(index_key.value().to_vec());
        key_hexes.push(hex.value().to_string());
    }
    for index_key in &index_keys {
        profile_keys.remove(index_key.as_slice())?;
    }
    drop(profile_keys);

    let mut keys = write_txn.open_table(PUBLIC_KEYS)?;
    let mut address_hexes = Vec::new();
    for hex in &key_hexes {
        if let Some(raw) = keys.remove(hex.as_str())? {
            let row: PublicKeyRecord = serde_json::from_slice(raw.value())?;
            address_hexes.push(row.address_hex);
        }
    }
    drop(keys);

    let mut addresses = write_txn.open_table(PUBLIC_KEYS_BY_ADDRESS)?;
    for address in &address_hexes {
        addresses.remove(address.as_str())?;
    }
    drop(addresses);

    // Chain preferences.
    let mut preferences = write_txn.open_table(CHAIN_PREFERENCES)?;
    let mut preference_keys = Vec::new();
    for entry in preferences.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
        let (key, _) = entry?;
        preference_keys.push(key.value().to_vec());
    }
    for key in &preference_keys {
        preferences.remove(key.as_slice())?;
    }
    drop(preferences);

    // DNAS rows, secrets, and the per-DAO index entries.
    let mut dnas = write_txn.open_table(DNAS_KEYS)?;
    let mut dnas_keys = Vec::new();
    let mut dnas_rows: Vec<DnasKeyRecord> = Vec::new();
    for entry in dnas.range::<&[u8]>(prefix.as_slice()..end.as_slice())? {
        let (key, value) = entry?;
        dnas_keys.push(key.value().to_vec());
        dnas_rows.push(serde_json::from_slice(value.value())?);
    }
    for key in &dnas_keys {
        dnas.remove(key.as_slice())?;
    }
    drop(dnas);

    let mut secrets = write_txn.open_table(DNAS_SECRETS)?;
    for key in &dnas_keys {
        secrets.remove(key.as_slice())?;
    }
    drop(secrets);

    let mut by_dao = write_txn.open_table(DNAS_BY_DAO)?;
    for row in &dnas_rows {
        for dao in super::dnas_keys::dao_index_names(&row.dao_addr) {
            by_dao.remove(
                super::super::db::dao_scoped_key(&dao, profile_id, &row.chain_id).as_slice(),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::TestSigner;
    use crate::storage::repository::dnas_keys::DnasKeyRepository;

    fn test_db() -> (tempfile::TempDir, ProfileDb) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = ProfileDb::open(&dir.path().join("profiles.redb")).expect("open db");
        (dir, db)
    }

    #[test]
    fn create_and_lookup_by_key_address_and_name() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);
        let signer = TestSigner::new(21);
        let key = signer.chain_public_key();

        let created = repo
            .create_with_key(
                &key,
                0,
                Some("alice".to_string()),
                None,
                &["juno-1".to_string()],
            )
            .unwrap();
        assert_eq!(created.nonce, 0);
        assert!(!created.uuid.is_empty());

        let (by_key, key_row) = repo.get_by_public_key_hex(key.hex()).unwrap().unwrap();
        assert_eq!(by_key.id, created.id);
        assert_eq!(key_row.address_hex, key.address_hex());

        let (by_address, _) = repo.get_by_address_hex(&key.address_hex()).unwrap().unwrap();
        assert_eq!(by_address.id, created.id);

        // Name lookup is case-insensitive.
        let by_name = repo.get_by_name("ALICE").unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[test]
    fn nonce_defaults_to_zero_and_increments() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);
        let signer = TestSigner::new(22);

        assert_eq!(
            repo.nonce_for_public_key(&signer.public_key_hex()).unwrap(),
            0
        );

        let created = repo
            .create_with_key(&signer.chain_public_key(), 0, None, None, &[])
            .unwrap();
        repo.increment_nonce(created.id).unwrap();
        repo.increment_nonce(created.id).unwrap();

        assert_eq!(
            repo.nonce_for_public_key(&signer.public_key_hex()).unwrap(),
            2
        );
    }

    #[test]
    fn duplicate_names_conflict() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);

        repo.create_with_key(
            &TestSigner::new(23).chain_public_key(),
            0,
            Some("bob".to_string()),
            None,
            &[],
        )
        .unwrap();

        let err = repo
            .create_with_key(
                &TestSigner::new(24).chain_public_key(),
                0,
                Some("BOB".to_string()),
                None,
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[test]
    fn partial_update_keeps_and_clears_fields() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);
        let created = repo
            .create_with_key(
                &TestSigner::new(25).chain_public_key(),
                0,
                Some("carol".to_string()),
                None,
                &[],
            )
            .unwrap();

        // None leaves the name untouched.
        let updated = repo.update(created.id, 1, None, None).unwrap();
        assert_eq!(updated.name.as_deref(), Some("carol"));
        assert_eq!(updated.nonce, 1);

        // Some(None) clears it and frees the name.
        let updated = repo.update(created.id, 2, Some(None), None).unwrap();
        assert_eq!(updated.name, None);
        assert!(repo.get_by_name("carol").unwrap().is_none());
    }

    #[test]
    fn renaming_frees_the_old_name() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);
        let created = repo
            .create_with_key(
                &TestSigner::new(26).chain_public_key(),
                0,
                Some("old".to_string()),
                None,
                &[],
            )
            .unwrap();

        repo.update(created.id, 1, Some(Some("new".to_string())), None)
            .unwrap();
        assert!(repo.get_by_name("old").unwrap().is_none());
        assert_eq!(repo.get_by_name("new").unwrap().unwrap().id, created.id);
    }

    #[test]
    fn delete_cascades_to_keys_and_dnas() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);
        let signer = TestSigner::new(27);
        let created = repo
            .create_with_key(
                &signer.chain_public_key(),
                0,
                Some("dave".to_string()),
                None,
                &["juno-1".to_string()],
            )
            .unwrap();

        let dnas = DnasKeyRepository::new(&db);
        dnas.upsert(
            created.id,
            "juno-1",
            "juno1dao",
            &signer.bech32_address(),
            "{}",
            None,
            "c2VjcmV0",
        )
        .unwrap();
        assert_eq!(db.counts().unwrap(), (1, 1, 1));

        repo.delete(created.id).unwrap();

        assert_eq!(db.counts().unwrap(), (0, 0, 0));
        assert!(repo.get_by_public_key_hex(&signer.public_key_hex()).unwrap().is_none());
        assert!(repo.get_by_name("dave").unwrap().is_none());
        assert!(dnas.list_for_dao("juno1dao").unwrap().is_empty());
        assert!(dnas
            .secret(created.id, "juno-1", "juno1dao")
            .unwrap()
            .is_none());
    }

    #[test]
    fn search_filters_by_prefix_and_chain() {
        let (_dir, db) = test_db();
        let repo = ProfileRepository::new(&db);

        repo.create_with_key(
            &TestSigner::new(31).chain_public_key(),
            0,
            Some("anna".to_string()),
            None,
            &["juno-1".to_string()],
        )
        .unwrap();
        repo.create_with_key(
            &TestSigner::new(32).chain_public_key(),
            0,
            Some("annette".to_string()),
            None,
            &["osmosis-1".to_string()],
        )
        .unwrap();
        repo.create_with_key(
            &TestSigner::new(33).chain_public_key(),
            0,
            Some("zed".to_string()),
            None,
            &["juno-1".to_string()],
        )
        .unwrap();

        let results = repo.search_by_name_prefix("ann", "juno-1", 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.name.as_deref(), Some("anna"));
    }
}
