// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduled task routes.
//!
//! These endpoints are called by Cloud Scheduler, not directly by users.
//! `require_scheduler_auth` is applied in routes/mod.rs.

use crate::services::RouteAggregator;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Router};
use chrono::Utc;
use std::sync::Arc;

/// Task handler routes (called by Cloud Scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/aggregate-routes", post(aggregate_routes))
}

/// Roll the last 24 hours of route history into `user_metrics`.
///
/// Always acknowledges the trigger; failures are logged by the aggregator
/// and the next scheduled run recomputes from scratch.
async fn aggregate_routes(State(state): State<Arc<AppState>>) -> StatusCode {
    let aggregator = RouteAggregator::new(state.store.clone());
    let report = aggregator.run(Utc::now()).await;

    if report.failed > 0 {
        tracing::warn!(
            failed = report.failed,
            active_users = report.active_users,
            "Route aggregation finished with failures"
        );
    }

    StatusCode::OK
}
