// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mapline: backend functions for the Mapline routing app.
//!
//! This crate provides self-service account deletion and the scheduled
//! aggregation of recent route history into per-user metrics.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{IdTokenVerifier, IdentityProvider};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Verifies Firebase ID tokens presented by app users.
    pub user_verifier: Arc<IdTokenVerifier>,
    /// Verifies Google OIDC tokens minted for Cloud Scheduler.
    pub scheduler_verifier: Arc<IdTokenVerifier>,
}
