// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Header Cloud Scheduler attaches to every HTTP target invocation.
pub const SCHEDULER_HEADER: &str = "x-cloudscheduler";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP / Firebase project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Public URL of this service (audience of scheduler OIDC tokens)
    pub api_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Service account Cloud Scheduler signs its OIDC tokens as
    pub scheduler_service_account: String,
    /// Use the in-memory store instead of Firestore
    pub offline: bool,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            api_url: "http://localhost:8080".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            scheduler_service_account: "mapline-scheduler@test-project.iam.gserviceaccount.com"
                .to_string(),
            offline: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let gcp_project_id =
            env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => 8080,
        };

        let scheduler_service_account = env::var("SCHEDULER_SERVICE_ACCOUNT")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|_| {
                format!("mapline-scheduler@{}.iam.gserviceaccount.com", gcp_project_id)
            });

        Ok(Self {
            api_url: env::var("API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("API_URL"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            offline: env::var("OFFLINE_MODE")
                .map(|v| matches!(v.trim(), "1" | "true"))
                .unwrap_or(false),
            gcp_project_id,
            port,
            scheduler_service_account,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
