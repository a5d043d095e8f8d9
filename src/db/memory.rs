// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory [`DocumentStore`] for offline mode and tests.
//!
//! Document IDs for subcollection entries are assigned from a counter so
//! that iteration order matches insertion order, as Firestore's default
//! ordering by document ID does for its auto IDs in practice.

use crate::db::{collections, DocRef, DocumentStore, Subcollection};
use crate::error::AppError;
use crate::models::{RouteHistoryEntry, User, UserMetrics};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<String, User>,
    saved_maps: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    route_history: BTreeMap<String, BTreeMap<String, RouteHistoryEntry>>,
    user_metrics: BTreeMap<String, UserMetrics>,
    next_id: u64,
    /// Every committed delete batch, in order
    commit_log: Vec<Vec<DocRef>>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:020}", self.next_id)
    }
}

/// Thread-safe in-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_user(&self, user_id: &str, user: User) {
        self.state
            .write()
            .await
            .users
            .insert(user_id.to_string(), user);
    }

    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        self.state.read().await.users.get(user_id).cloned()
    }

    /// Add an opaque saved map; returns its document ID.
    pub async fn add_saved_map(&self, user_id: &str, map: serde_json::Value) -> String {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        state
            .saved_maps
            .entry(user_id.to_string())
            .or_default()
            .insert(id.clone(), map);
        id
    }

    /// Add a route history entry; returns its document ID.
    pub async fn add_route(&self, user_id: &str, entry: RouteHistoryEntry) -> String {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        state
            .route_history
            .entry(user_id.to_string())
            .or_default()
            .insert(id.clone(), entry);
        id
    }

    /// Number of documents in one of the user's subcollections.
    pub async fn subcollection_len(&self, user_id: &str, subcollection: Subcollection) -> usize {
        let state = self.state.read().await;
        match subcollection {
            Subcollection::SavedMaps => state.saved_maps.get(user_id).map_or(0, |m| m.len()),
            Subcollection::RouteHistory => {
                state.route_history.get(user_id).map_or(0, |m| m.len())
            }
        }
    }

    /// Delete batches committed so far.
    pub async fn commit_log(&self) -> Vec<Vec<DocRef>> {
        self.state.read().await.commit_log.clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn active_user_ids(&self) -> Result<Vec<String>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|(_, user)| user.is_active)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn subcollection_ids(
        &self,
        user_id: &str,
        subcollection: Subcollection,
    ) -> Result<Vec<String>, AppError> {
        let state = self.state.read().await;
        let ids = match subcollection {
            Subcollection::SavedMaps => state
                .saved_maps
                .get(user_id)
                .map(|m| m.keys().cloned().collect()),
            Subcollection::RouteHistory => state
                .route_history
                .get(user_id)
                .map(|m| m.keys().cloned().collect()),
        };
        Ok(ids.unwrap_or_default())
    }

    async fn route_history_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RouteHistoryEntry>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .route_history
            .get(user_id)
            .map(|routes| {
                routes
                    .values()
                    .filter(|entry| entry.created_at > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_user_metrics(&self, user_id: &str) -> Result<Option<UserMetrics>, AppError> {
        Ok(self.state.read().await.user_metrics.get(user_id).cloned())
    }

    async fn set_user_metrics(
        &self,
        user_id: &str,
        metrics: &UserMetrics,
    ) -> Result<(), AppError> {
        self.state
            .write()
            .await
            .user_metrics
            .insert(user_id.to_string(), metrics.clone());
        Ok(())
    }

    async fn commit_deletes(&self, docs: &[DocRef]) -> Result<(), AppError> {
        let mut state = self.state.write().await;

        // Validate the whole batch before touching anything.
        for doc in docs {
            let known = match (&doc.parent, doc.collection) {
                (None, collections::USERS) | (None, collections::USER_METRICS) => true,
                (Some(parent), collections::SAVED_MAPS)
                | (Some(parent), collections::ROUTE_HISTORY) => {
                    parent.collection == collections::USERS
                }
                _ => false,
            };
            if !known {
                return Err(AppError::Database(format!(
                    "Unknown collection for deletion: {}/{}",
                    doc.collection, doc.id
                )));
            }
        }

        for doc in docs {
            match (&doc.parent, doc.collection) {
                (None, collections::USERS) => {
                    state.users.remove(&doc.id);
                }
                (None, collections::USER_METRICS) => {
                    state.user_metrics.remove(&doc.id);
                }
                (Some(parent), collections::SAVED_MAPS) => {
                    if let Some(maps) = state.saved_maps.get_mut(&parent.id) {
                        maps.remove(&doc.id);
                    }
                }
                (Some(parent), collections::ROUTE_HISTORY) => {
                    if let Some(routes) = state.route_history.get_mut(&parent.id) {
                        routes.remove(&doc.id);
                    }
                }
                _ => {}
            }
        }

        state.saved_maps.retain(|_, maps| !maps.is_empty());
        state.route_history.retain(|_, routes| !routes.is_empty());
        state.commit_log.push(docs.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_route_history_window_is_exclusive() {
        let store = MemoryStore::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let since = now - Duration::hours(24);

        store
            .add_route("u1", RouteHistoryEntry::new(since, 1.0, 1.0, None))
            .await;
        store
            .add_route(
                "u1",
                RouteHistoryEntry::new(since + Duration::seconds(1), 2.0, 2.0, None),
            )
            .await;

        let routes = store.route_history_since("u1", since).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].distance_meters(), 2.0);
    }

    #[tokio::test]
    async fn test_unknown_collection_rejects_whole_batch() {
        let store = MemoryStore::new();
        store.put_user("u1", User { is_active: true }).await;

        let batch = vec![
            DocRef::root(collections::USERS, "u1"),
            DocRef::root("nope", "x"),
        ];
        assert!(store.commit_deletes(&batch).await.is_err());
        assert!(store.get_user("u1").await.is_some());
        assert!(store.commit_log().await.is_empty());
    }

    #[tokio::test]
    async fn test_subcollection_ids_in_insertion_order() {
        let store = MemoryStore::new();
        let first = store.add_saved_map("u1", serde_json::json!({"name": "a"})).await;
        let second = store.add_saved_map("u1", serde_json::json!({"name": "b"})).await;

        let ids = store
            .subcollection_ids("u1", Subcollection::SavedMaps)
            .await
            .unwrap();
        assert_eq!(ids, vec![first, second]);
    }
}
