// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use mapline_api::config::Config;
use mapline_api::db::{
    collections, DocRef, DocumentStore, FirestoreDb, MemoryStore, Subcollection,
};
use mapline_api::error::AppError;
use mapline_api::models::{RouteHistoryEntry, User, UserMetrics};
use mapline_api::routes::create_router;
use mapline_api::services::{IdTokenVerifier, IdentityProvider, TokenProfile};
use mapline_api::AppState;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_KID: &str = "test-kid";
const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_private.pem");
const TEST_PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/test_rsa_public.pem");

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Raw emulator client for writing the documents the app itself owns.
#[allow(dead_code)]
pub struct EmulatorSeeder {
    client: firestore::FirestoreDb,
}

#[allow(dead_code)]
impl EmulatorSeeder {
    pub async fn connect() -> Self {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: Utc::now() + chrono::Duration::hours(1),
            })
        });

        let client = firestore::FirestoreDb::with_options_token_source(
            firestore::FirestoreDbOptions::new("test-project".to_string()),
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .expect("Failed to connect to Firestore emulator");

        Self { client }
    }

    pub async fn put_user(&self, user_id: &str, user: &User) {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user_id)
            .object(user)
            .execute()
            .await
            .expect("Failed to write user");
    }

    pub async fn put_route(&self, user_id: &str, route_id: &str, entry: &RouteHistoryEntry) {
        let parent_path = self
            .client
            .parent_path(collections::USERS, user_id)
            .expect("Invalid user path");
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::ROUTE_HISTORY)
            .document_id(route_id)
            .parent(&parent_path)
            .object(entry)
            .execute()
            .await
            .expect("Failed to write route");
    }
}

/// Identity provider that records deletions instead of calling Firebase.
#[derive(Default)]
pub struct RecordingIdentity {
    deleted: Mutex<Vec<String>>,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl RecordingIdentity {
    pub fn failing() -> Self {
        let identity = Self::default();
        identity.fail.store(true, Ordering::SeqCst);
        identity
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn delete_user(&self, uid: &str) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Identity("identity backend unavailable".to_string()));
        }
        self.deleted.lock().unwrap().push(uid.to_string());
        Ok(())
    }
}

/// Store wrapper that injects failures into a [`MemoryStore`].
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    /// Commits allowed before every further commit fails
    commits_before_failure: Option<usize>,
    commits: AtomicUsize,
    failing_route_users: Mutex<HashSet<String>>,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            commits_before_failure: None,
            commits: AtomicUsize::new(0),
            failing_route_users: Mutex::new(HashSet::new()),
        }
    }

    /// Let `successful` commits through, then fail the rest.
    pub fn failing_commits_after(inner: Arc<MemoryStore>, successful: usize) -> Self {
        Self {
            commits_before_failure: Some(successful),
            ..Self::new(inner)
        }
    }

    /// Make route history queries for `user_id` fail.
    pub fn fail_routes_for(&self, user_id: &str) {
        self.failing_route_users
            .lock()
            .unwrap()
            .insert(user_id.to_string());
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn active_user_ids(&self) -> Result<Vec<String>, AppError> {
        self.inner.active_user_ids().await
    }

    async fn subcollection_ids(
        &self,
        user_id: &str,
        subcollection: Subcollection,
    ) -> Result<Vec<String>, AppError> {
        self.inner.subcollection_ids(user_id, subcollection).await
    }

    async fn route_history_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RouteHistoryEntry>, AppError> {
        if self.failing_route_users.lock().unwrap().contains(user_id) {
            return Err(AppError::Database("injected query failure".to_string()));
        }
        self.inner.route_history_since(user_id, since).await
    }

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>, AppError> {
        self.inner.get_user_metrics(user_id).await
    }

    async fn set_user_metrics(
        &self,
        user_id: &str,
        metrics: &UserMetrics,
    ) -> Result<(), AppError> {
        self.inner.set_user_metrics(user_id, metrics).await
    }

    async fn commit_deletes(&self, docs: &[DocRef]) -> Result<(), AppError> {
        let attempt = self.commits.fetch_add(1, Ordering::SeqCst);
        if self
            .commits_before_failure
            .is_some_and(|allowed| attempt >= allowed)
        {
            return Err(AppError::Database("injected commit failure".to_string()));
        }
        self.inner.commit_deletes(docs).await
    }
}

/// Test app with handles on its in-memory collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<RecordingIdentity>,
}

fn static_verifier(profile: TokenProfile) -> Arc<IdTokenVerifier> {
    let key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).expect("Failed to parse test public key");
    Arc::new(
        IdTokenVerifier::new_with_static_key(profile, TEST_KID, key)
            .expect("Failed to build static verifier"),
    )
}

/// Create a test app backed by a fresh [`MemoryStore`].
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    create_test_app_with(store.clone(), store, Arc::new(RecordingIdentity::default()))
}

/// Create a test app whose handlers see `backend`, which may wrap `store`.
#[allow(dead_code)]
pub fn create_test_app_with(
    store: Arc<MemoryStore>,
    backend: Arc<dyn DocumentStore>,
    identity: Arc<RecordingIdentity>,
) -> TestApp {
    let config = Config::test_default();

    let state = Arc::new(AppState {
        user_verifier: static_verifier(TokenProfile::firebase(&config.gcp_project_id)),
        scheduler_verifier: static_verifier(TokenProfile::scheduler(&config)),
        config,
        store: backend,
        identity: identity.clone(),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        identity,
    }
}

#[derive(Serialize)]
struct TestClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    iat: u64,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
}

fn sign(claims: &TestClaims<'_>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY).expect("Failed to parse test private key");
    encode(&header, claims, &key).expect("Failed to sign test token")
}

fn now_secs() -> u64 {
    Utc::now().timestamp() as u64
}

/// Firebase ID token for `uid` in the test project.
#[allow(dead_code)]
pub fn create_test_firebase_token(config: &Config, uid: &str) -> String {
    let issuer = format!("https://securetoken.google.com/{}", config.gcp_project_id);
    let now = now_secs();
    sign(&TestClaims {
        iss: &issuer,
        aud: &config.gcp_project_id,
        sub: uid,
        iat: now,
        exp: now + 3600,
        email: None,
        email_verified: None,
    })
}

/// Google OIDC token as Cloud Scheduler would mint it for this service.
#[allow(dead_code)]
pub fn create_test_scheduler_token(config: &Config, email: &str) -> String {
    let now = now_secs();
    sign(&TestClaims {
        iss: "https://accounts.google.com",
        aud: &config.api_url,
        sub: "112233445566778899000",
        iat: now,
        exp: now + 3600,
        email: Some(email),
        email_verified: Some(true),
    })
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
