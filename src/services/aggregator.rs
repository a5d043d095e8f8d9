// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled aggregation of recent route history into `user_metrics`.

use crate::db::DocumentStore;
use crate::error::Result;
use crate::models::UserMetrics;
use crate::time_utils::{aggregation_window_start, format_utc_rfc3339};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Outcome counts for one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    /// Users with `is_active == true`
    pub active_users: u32,
    /// Users whose metrics were rewritten
    pub updated: u32,
    /// Users with no routes in the window
    pub skipped: u32,
    /// Users whose processing failed
    pub failed: u32,
}

/// What happened to a single user during a run.
enum UserOutcome {
    Updated,
    Skipped,
}

/// Recomputes per-user metrics from the trailing window.
pub struct RouteAggregator {
    store: Arc<dyn DocumentStore>,
}

impl RouteAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run one aggregation pass as of `now`.
    ///
    /// Never fails: errors are logged, and a failure for one user does
    /// not stop the others.
    pub async fn run(&self, now: DateTime<Utc>) -> AggregationReport {
        let mut report = AggregationReport::default();

        let user_ids = match self.store.active_user_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Error aggregating route data: active user query failed");
                return report;
            }
        };
        report.active_users = user_ids.len() as u32;

        for user_id in &user_ids {
            match self.aggregate_user(user_id, now).await {
                Ok(UserOutcome::Updated) => report.updated += 1,
                Ok(UserOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        user_id = %user_id,
                        error = %e,
                        "Error aggregating route data for user"
                    );
                }
            }
        }

        tracing::info!(
            run_at = %format_utc_rfc3339(now),
            active_users = report.active_users,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Route data aggregation completed"
        );

        report
    }

    async fn aggregate_user(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserOutcome> {
        let since = aggregation_window_start(now);
        let routes = self.store.route_history_since(user_id, since).await?;

        let Some(metrics) = UserMetrics::from_routes(&routes, now) else {
            tracing::debug!(user_id, "No recent routes, leaving metrics untouched");
            return Ok(UserOutcome::Skipped);
        };

        self.store.set_user_metrics(user_id, &metrics).await?;

        tracing::debug!(
            user_id,
            routes = routes.len(),
            recent_distance = metrics.recent_distance,
            recent_duration = metrics.recent_duration,
            favorites = metrics.favorite_destinations.len(),
            "Updated user metrics"
        );

        Ok(UserOutcome::Updated)
    }
}
