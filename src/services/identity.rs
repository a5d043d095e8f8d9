// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication admin client.
//!
//! Deletes user accounts through the Identity Toolkit REST API. In
//! production the access token comes from the Cloud Run metadata server;
//! with FIREBASE_AUTH_EMULATOR_HOST set, requests go to the emulator with
//! its fixed `owner` credential instead.

use crate::config::Config;
use crate::error::AppError;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Refresh cached access tokens this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const EMULATOR_TOKEN: &str = "owner";

/// Identity provider operations the handlers depend on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Delete the identity record for `uid`.
    ///
    /// An account that no longer exists counts as deleted.
    async fn delete_user(&self, uid: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
enum AuthEndpoint {
    Production,
    Emulator { host: String },
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Firebase Auth client backed by the Identity Toolkit API.
pub struct FirebaseAuthClient {
    http_client: reqwest::Client,
    project_id: String,
    endpoint: AuthEndpoint,
    token_cache: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl FirebaseAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Identity Toolkit HTTP client")?;

        let endpoint = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) if !host.trim().is_empty() => {
                tracing::info!(host = %host, "Using Firebase Auth Emulator");
                AuthEndpoint::Emulator {
                    host: host.trim().to_string(),
                }
            }
            _ => AuthEndpoint::Production,
        };

        Ok(Self {
            http_client,
            project_id: config.gcp_project_id.clone(),
            endpoint,
            token_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    fn delete_url(&self) -> String {
        accounts_delete_url(&self.endpoint, &self.project_id)
    }

    async fn access_token(&self) -> Result<String, AppError> {
        if let AuthEndpoint::Emulator { .. } = self.endpoint {
            return Ok(EMULATOR_TOKEN.to_string());
        }

        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another request may have refreshed while we waited.
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let response = self
            .http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Metadata token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Identity(format!(
                "Metadata token request returned status {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| AppError::Identity(format!("Invalid metadata token JSON: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *self.token_cache.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        tracing::debug!(expires_in = token.expires_in, "Fetched access token");
        Ok(token.access_token)
    }

    async fn cached_token(&self) -> Option<String> {
        self.token_cache
            .read()
            .await
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.access_token.clone())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn delete_user(&self, uid: &str) -> Result<(), AppError> {
        let token = self.access_token().await?;

        let response = self
            .http_client
            .post(self.delete_url())
            .bearer_auth(token)
            .json(&serde_json::json!({ "localId": uid }))
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("accounts:delete request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if is_user_not_found(&body) {
            tracing::info!(uid, "Identity record already gone");
            return Ok(());
        }

        Err(AppError::Identity(format!(
            "accounts:delete returned {status}: {body}"
        )))
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

fn accounts_delete_url(endpoint: &AuthEndpoint, project_id: &str) -> String {
    let base = match endpoint {
        AuthEndpoint::Production => IDENTITY_TOOLKIT_URL.to_string(),
        AuthEndpoint::Emulator { host } => {
            format!("http://{host}/identitytoolkit.googleapis.com/v1")
        }
    };
    format!("{base}/projects/{project_id}/accounts:delete")
}

/// Identity Toolkit reports a missing account as `USER_NOT_FOUND`.
fn is_user_not_found(body: &str) -> bool {
    serde_json::from_str::<GoogleErrorEnvelope>(body)
        .map(|envelope| envelope.error.message.starts_with("USER_NOT_FOUND"))
        .unwrap_or(false)
}
