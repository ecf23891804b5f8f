// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, path::Path};

use tracing_subscriber::EnvFilter;

use dnas_relay_server::api::router;
use dnas_relay_server::config::{DB_PATH_ENV, DEFAULT_DB_PATH};
use dnas_relay_server::providers::{IndexerClient, PinnerClient};
use dnas_relay_server::state::AppState;
use dnas_relay_server::storage::ProfileDb;

#[tokio::main]
async fn main() {
    init_tracing();

    // Open (or create) the embedded profile database.
    let db_path = env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    let db = ProfileDb::open(Path::new(&db_path)).expect("Failed to open profile database");
    tracing::info!(path = %db_path, "Profile database ready");

    let state = AppState::new(db, IndexerClient::from_env(), PinnerClient::from_env());
    let app = router(state);

    // Parse bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    tracing::info!("DNAS relay listening on http://{addr} (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");
}

/// Initialize tracing with `RUST_LOG` filtering; `LOG_FORMAT=json` switches
/// to structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received");
}
