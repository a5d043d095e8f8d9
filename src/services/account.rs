// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Self-service account deletion.
//!
//! Flow:
//! 1. Check the caller is signed in and is deleting their own account
//! 2. Enumerate saved maps and route history
//! 3. Commit deletes for those plus the user and metrics documents
//! 4. Delete the identity record, only once the data is gone
//!
//! Data goes first so that a failed identity deletion never leaves data
//! behind for a still-valid login. A failed commit leaves the account
//! intact enough to retry.

use crate::db::{collections, DocRef, DocumentStore, Subcollection};
use crate::error::{AppError, Result};
use crate::services::IdentityProvider;
use std::sync::Arc;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
pub const BATCH_SIZE: usize = 400;

/// Result of a completed account deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAccountOutcome {
    /// Documents removed, including the user and metrics documents
    pub deleted_documents: usize,
    /// Number of commits the deletion was split into
    pub batches: usize,
}

/// Deletes a user's data and identity record.
pub struct AccountDeleter {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl AccountDeleter {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Delete `target_user_id` on behalf of `caller_uid`.
    ///
    /// Fails with `Unauthenticated` when there is no caller and with
    /// `PermissionDenied` when the caller targets anyone else, including an
    /// empty `userId`; neither touches the store. Any downstream failure becomes `DeletionFailed`.
    pub async fn delete(
        &self,
        caller_uid: Option<&str>,
        target_user_id: &str,
    ) -> Result<DeleteAccountOutcome> {
        let Some(caller_uid) = caller_uid else {
            return Err(AppError::Unauthenticated);
        };

        if caller_uid != target_user_id {
            tracing::warn!(
                caller = %caller_uid,
                target = %target_user_id,
                "Blocked attempt to delete another user's account"
            );
            return Err(AppError::PermissionDenied(
                "You can only delete your own account.".to_string(),
            ));
        }

        tracing::info!(user_id = %target_user_id, "User-initiated account deletion");

        match self.delete_everything(target_user_id).await {
            Ok(outcome) => {
                tracing::info!(
                    user_id = %target_user_id,
                    deleted_documents = outcome.deleted_documents,
                    batches = outcome.batches,
                    "Account deleted"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(user_id = %target_user_id, error = %e, "Error deleting account");
                Err(AppError::DeletionFailed(e.to_string()))
            }
        }
    }

    async fn delete_everything(&self, user_id: &str) -> Result<DeleteAccountOutcome> {
        let mut children = Vec::new();
        for subcollection in Subcollection::ALL {
            let ids = self.store.subcollection_ids(user_id, subcollection).await?;
            tracing::debug!(
                user_id,
                subcollection = subcollection.as_str(),
                count = ids.len(),
                "Marked subcollection documents for deletion"
            );
            children.extend(
                ids.into_iter()
                    .map(|id| DocRef::user_child(user_id, subcollection, id)),
            );
        }

        let roots = vec![
            DocRef::root(collections::USERS, user_id),
            DocRef::root(collections::USER_METRICS, user_id),
        ];

        let batches = plan_batches(children, roots, BATCH_SIZE);
        let mut deleted_documents = 0;

        for (index, batch) in batches.iter().enumerate() {
            self.store.commit_deletes(batch).await?;
            deleted_documents += batch.len();
            tracing::debug!(
                user_id,
                batch = index + 1,
                of = batches.len(),
                count = batch.len(),
                "Committed deletion batch"
            );
        }

        // Only reached once every document is gone.
        self.identity.delete_user(user_id).await?;
        tracing::debug!(user_id, "Deleted identity record");

        Ok(DeleteAccountOutcome {
            deleted_documents,
            batches: batches.len(),
        })
    }
}

/// Split deletions into commits of at most `batch_size` documents.
///
/// `roots` always land together in the final commit, after every child.
/// When everything fits, the result is a single commit.
fn plan_batches(children: Vec<DocRef>, roots: Vec<DocRef>, batch_size: usize) -> Vec<Vec<DocRef>> {
    let batch_size = batch_size.max(roots.len()).max(1);

    let mut batches: Vec<Vec<DocRef>> = children
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    match batches.last_mut() {
        Some(last) if last.len() + roots.len() <= batch_size => last.extend(roots),
        _ => batches.push(roots),
    }

    batches
}
