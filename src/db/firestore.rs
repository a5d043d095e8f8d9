// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore implementation of [`DocumentStore`].
//!
//! Covers:
//! - Users (active-user scan)
//! - Saved maps and route history (per-user subcollections)
//! - User metrics (overwrite per aggregation run)
//! - Atomic multi-document deletes

use crate::db::{collections, DocRef, DocumentStore, Subcollection};
use crate::error::AppError;
use crate::models::{RouteHistoryEntry, UserMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip ADC lookup entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    /// Path of `users/{user_id}`, used as the parent of its subcollections.
    fn user_path(&self, user_id: &str) -> Result<firestore::ParentPathBuilder, AppError> {
        self.client
            .parent_path(collections::USERS, user_id)
            .map_err(|e| AppError::Database(format!("Invalid user path {}: {}", user_id, e)))
    }
}

/// Extract the trailing document ID from a full resource name.
fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    async fn active_user_ids(&self) -> Result<Vec<String>, AppError> {
        let docs = self
            .client
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.for_all([q.field("is_active").eq(true)]))
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs
            .iter()
            .map(|doc| document_id(&doc.name).to_string())
            .collect())
    }

    async fn subcollection_ids(
        &self,
        user_id: &str,
        subcollection: Subcollection,
    ) -> Result<Vec<String>, AppError> {
        let parent_path = self.user_path(user_id)?;

        let docs = self
            .client
            .fluent()
            .select()
            .from(subcollection.as_str())
            .parent(&parent_path)
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs
            .iter()
            .map(|doc| document_id(&doc.name).to_string())
            .collect())
    }

    async fn route_history_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RouteHistoryEntry>, AppError> {
        let parent_path = self.user_path(user_id)?;

        self.client
            .fluent()
            .select()
            .from(collections::ROUTE_HISTORY)
            .parent(&parent_path)
            .filter(move |q| {
                q.for_all([q
                    .field("created_at")
                    .greater_than(firestore::FirestoreTimestamp(since))])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::USER_METRICS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_user_metrics(
        &self,
        user_id: &str,
        metrics: &UserMetrics,
    ) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::USER_METRICS)
            .document_id(user_id)
            .object(metrics)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn commit_deletes(&self, docs: &[DocRef]) -> Result<(), AppError> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for doc in docs {
            let added = match &doc.parent {
                Some(parent) => {
                    let parent_path = self
                        .client
                        .parent_path(parent.collection, &parent.id)
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    self.client
                        .fluent()
                        .delete()
                        .from(doc.collection)
                        .document_id(&doc.id)
                        .parent(&parent_path)
                        .add_to_transaction(&mut transaction)
                        .map(|_| ())
                }
                None => self
                    .client
                    .fluent()
                    .delete()
                    .from(doc.collection)
                    .document_id(&doc.id)
                    .add_to_transaction(&mut transaction)
                    .map(|_| ()),
            };

            added.map_err(|e| {
                AppError::Database(format!(
                    "Failed to add deletion to transaction for {}/{}: {}",
                    doc.collection, doc.id, e
                ))
            })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit batch deletion: {}", e)))?;

        tracing::debug!(count = docs.len(), "Committed batch deletion");
        Ok(())
    }
}
