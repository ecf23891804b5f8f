// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::providers::{IndexerClient, PinnerClient};
use crate::storage::ProfileDb;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<ProfileDb>,
    pub indexer: Arc<IndexerClient>,
    pub pinner: Arc<PinnerClient>,
}

impl AppState {
    pub fn new(db: ProfileDb, indexer: IndexerClient, pinner: PinnerClient) -> Self {
        Self {
            db: Arc::new(db),
            indexer: Arc::new(indexer),
            pinner: Arc::new(pinner),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State backed by a temp-dir database; providers point at unroutable
    /// hosts so a test that accidentally goes to the network fails fast.
    pub fn for_tests() -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = ProfileDb::open(&dir.path().join("profiles.redb")).expect("open db");
        let state = Self::new(
            db,
            IndexerClient::new("http://127.0.0.1:9"),
            PinnerClient::new("http://127.0.0.1:9"),
        );
        (state, dir)
    }
}
