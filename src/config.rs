// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DB_PATH` | Path of the embedded profile database file | `/data/profiles.redb` |
//! | `INDEXER_BASE_URL` | Chain indexer API base URL | `https://indexer.daodao.zone` |
//! | `PINNER_BASE_URL` | File pinning API base URL | `https://pinapi.jackalprotocol.com` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the profile database path.
pub const DB_PATH_ENV: &str = "DB_PATH";

/// Default location of the redb database file.
pub const DEFAULT_DB_PATH: &str = "/data/profiles.redb";

/// Environment variable name for the chain indexer base URL.
pub const INDEXER_BASE_URL_ENV: &str = "INDEXER_BASE_URL";

/// Default chain indexer endpoint (DAO membership, widget params, NFTs).
pub const DEFAULT_INDEXER_BASE_URL: &str = "https://indexer.daodao.zone";

/// Environment variable name for the pinning API base URL.
pub const PINNER_BASE_URL_ENV: &str = "PINNER_BASE_URL";

/// Default pinning API endpoint.
pub const DEFAULT_PINNER_BASE_URL: &str = "https://pinapi.jackalprotocol.com";
