// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! DNAS Profile Relay - DAO-Scoped Credential Delegation Service
//!
//! This crate provides the profile/authorization relay for Cosmos chains:
//! profiles register public keys, attach per-DAO pinning credentials, and
//! verified DAO members spend those credentials through the upload relay
//! without ever seeing the raw key.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Signed-envelope authentication (amino sign-docs)
//! - `chain` - Chain registry, public keys, sign-doc reconstruction
//! - `providers` - Chain indexer and pinning API clients
//! - `storage` - Embedded profile database (redb)

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod state;
pub mod storage;
