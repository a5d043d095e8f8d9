// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mapline API Server
//!
//! Serves the `deleteUserAccount` callable and the scheduled route
//! aggregation task for the Mapline routing app.

use mapline_api::{
    config::Config,
    db::{DocumentStore, FirestoreDb, MemoryStore},
    services::{FirebaseAuthClient, IdTokenVerifier, IdentityProvider, TokenProfile},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, offline = config.offline, "Starting Mapline API");

    let store: Arc<dyn DocumentStore> = if config.offline {
        tracing::warn!("OFFLINE_MODE set, using in-memory document store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FirestoreDb::new(&config.gcp_project_id).await?)
    };

    let identity: Arc<dyn IdentityProvider> = Arc::new(FirebaseAuthClient::new(&config)?);

    let user_verifier = Arc::new(IdTokenVerifier::new(TokenProfile::firebase(
        &config.gcp_project_id,
    ))?);
    let scheduler_verifier = Arc::new(IdTokenVerifier::new(TokenProfile::scheduler(&config))?);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        identity,
        user_verifier,
        scheduler_verifier,
    });

    // Build router
    let app = mapline_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mapline_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
