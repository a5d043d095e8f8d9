// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route aggregation against the in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mapline_api::db::{DocumentStore, MemoryStore};
use mapline_api::models::{FavoriteDestination, RouteHistoryEntry, User, UserMetrics};
use mapline_api::services::{AggregationReport, RouteAggregator};
use std::sync::Arc;

mod common;
use common::FlakyStore;

fn run_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap()
}

fn fav(place_id: &str, count: u32) -> FavoriteDestination {
    FavoriteDestination {
        place_id: place_id.to_string(),
        count,
    }
}

async fn seed_example_routes(store: &MemoryStore, user_id: &str) {
    let at = run_time() - Duration::hours(2);
    store.put_user(user_id, User { is_active: true }).await;
    store
        .add_route(user_id, RouteHistoryEntry::new(at, 1000.0, 60.0, Some("A")))
        .await;
    store
        .add_route(user_id, RouteHistoryEntry::new(at, 2000.0, 120.0, Some("B")))
        .await;
    store
        .add_route(user_id, RouteHistoryEntry::new(at, 500.0, 30.0, Some("A")))
        .await;
}

#[tokio::test]
async fn test_aggregates_recent_routes() {
    let store = Arc::new(MemoryStore::new());
    seed_example_routes(&store, "u1").await;
    // Outside the window
    store
        .add_route(
            "u1",
            RouteHistoryEntry::new(run_time() - Duration::hours(30), 9000.0, 900.0, Some("C")),
        )
        .await;

    let report = RouteAggregator::new(store.clone()).run(run_time()).await;

    assert_eq!(
        report,
        AggregationReport {
            active_users: 1,
            updated: 1,
            skipped: 0,
            failed: 0,
        }
    );

    let metrics = store.get_user_metrics("u1").await.unwrap().unwrap();
    assert_eq!(metrics.last_active, run_time());
    assert!((metrics.recent_distance - 3.5).abs() < 1e-9);
    assert!((metrics.recent_duration - 3.5).abs() < 1e-9);
    assert_eq!(metrics.favorite_destinations, vec![fav("A", 2), fav("B", 1)]);
}

#[tokio::test]
async fn test_user_without_recent_routes_keeps_prior_metrics() {
    let store = Arc::new(MemoryStore::new());
    store.put_user("idle", User { is_active: true }).await;
    let earlier = run_time() - Duration::days(3);
    let prior = UserMetrics {
        last_active: earlier,
        recent_distance: 12.0,
        recent_duration: 40.0,
        favorite_destinations: vec![fav("X", 4)],
    };
    store.set_user_metrics("idle", &prior).await.unwrap();
    store
        .add_route("idle", RouteHistoryEntry::new(earlier, 100.0, 10.0, Some("X")))
        .await;

    let report = RouteAggregator::new(store.clone()).run(run_time()).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(store.get_user_metrics("idle").await.unwrap(), Some(prior));
}

#[tokio::test]
async fn test_rerun_only_advances_last_active() {
    let store = Arc::new(MemoryStore::new());
    seed_example_routes(&store, "u1").await;
    let aggregator = RouteAggregator::new(store.clone());

    aggregator.run(run_time()).await;
    let first = store.get_user_metrics("u1").await.unwrap().unwrap();

    let later = run_time() + Duration::minutes(5);
    aggregator.run(later).await;
    let second = store.get_user_metrics("u1").await.unwrap().unwrap();

    assert_eq!(first.last_active, run_time());
    assert_eq!(second.last_active, later);
    assert_eq!(first.recent_distance, second.recent_distance);
    assert_eq!(first.recent_duration, second.recent_duration);
    assert_eq!(first.favorite_destinations, second.favorite_destinations);
}

#[tokio::test]
async fn test_inactive_users_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    store.put_user("gone", User { is_active: false }).await;
    store
        .add_route(
            "gone",
            RouteHistoryEntry::new(run_time() - Duration::hours(1), 100.0, 10.0, None),
        )
        .await;

    let report = RouteAggregator::new(store.clone()).run(run_time()).await;

    assert_eq!(report, AggregationReport::default());
    assert!(store.get_user_metrics("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_one_failing_user_does_not_stop_the_rest() {
    let store = Arc::new(MemoryStore::new());
    seed_example_routes(&store, "a-user").await;
    seed_example_routes(&store, "b-broken").await;
    seed_example_routes(&store, "c-user").await;

    let flaky = Arc::new(FlakyStore::new(store.clone()));
    flaky.fail_routes_for("b-broken");

    let report = RouteAggregator::new(flaky).run(run_time()).await;

    assert_eq!(report.active_users, 3);
    assert_eq!(report.updated, 2);
    assert_eq!(report.failed, 1);
    assert!(store.get_user_metrics("a-user").await.unwrap().is_some());
    assert!(store.get_user_metrics("b-broken").await.unwrap().is_none());
    assert!(store.get_user_metrics("c-user").await.unwrap().is_some());
}
