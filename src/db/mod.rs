// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, with an in-memory stand-in).

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use self::memory::MemoryStore;

use crate::error::AppError;
use crate::models::{RouteHistoryEntry, UserMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Subcollection of `users/{user_id}`
    pub const SAVED_MAPS: &str = "saved_maps";
    /// Subcollection of `users/{user_id}`
    pub const ROUTE_HISTORY: &str = "route_history";
    /// Route metrics (keyed by user_id)
    pub const USER_METRICS: &str = "user_metrics";
}

/// Per-user subcollections nested under `users/{user_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subcollection {
    SavedMaps,
    RouteHistory,
}

impl Subcollection {
    pub const ALL: [Subcollection; 2] = [Subcollection::SavedMaps, Subcollection::RouteHistory];

    pub fn as_str(self) -> &'static str {
        match self {
            Subcollection::SavedMaps => collections::SAVED_MAPS,
            Subcollection::RouteHistory => collections::ROUTE_HISTORY,
        }
    }
}

/// Parent document of a subcollection document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub collection: &'static str,
    pub id: String,
}

/// Reference to a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocRef {
    pub parent: Option<ParentRef>,
    pub collection: &'static str,
    pub id: String,
}

impl DocRef {
    /// A document in a top-level collection.
    pub fn root(collection: &'static str, id: impl Into<String>) -> Self {
        Self {
            parent: None,
            collection,
            id: id.into(),
        }
    }

    /// A document in a subcollection of `users/{user_id}`.
    pub fn user_child(user_id: &str, subcollection: Subcollection, id: impl Into<String>) -> Self {
        Self {
            parent: Some(ParentRef {
                collection: collections::USERS,
                id: user_id.to_string(),
            }),
            collection: subcollection.as_str(),
            id: id.into(),
        }
    }
}

/// Document store operations the handlers depend on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// IDs of users with `is_active == true`.
    async fn active_user_ids(&self) -> Result<Vec<String>, AppError>;

    /// IDs of every document in one of the user's subcollections.
    async fn subcollection_ids(
        &self,
        user_id: &str,
        subcollection: Subcollection,
    ) -> Result<Vec<String>, AppError>;

    /// Route history entries with `created_at > since`.
    async fn route_history_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RouteHistoryEntry>, AppError>;

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>, AppError>;

    /// Overwrite the user's metrics document.
    async fn set_user_metrics(&self, user_id: &str, metrics: &UserMetrics)
        -> Result<(), AppError>;

    /// Delete the given documents in one atomic commit.
    ///
    /// Deleting a document that does not exist is not an error.
    async fn commit_deletes(&self, docs: &[DocRef]) -> Result<(), AppError>;
}
