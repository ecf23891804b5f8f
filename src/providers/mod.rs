// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound HTTP collaborators: the chain indexer (DAO membership, widget
//! config, NFT lookups) and the file pinning API.

pub mod indexer;
pub mod pinner;

pub use indexer::{DnasWidgetParams, IndexerClient, IndexerError};
pub use pinner::{PinUpload, PinnerClient, PinnerError, RelayFile};
