// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rolling route metrics, recomputed from the trailing aggregation window.
//!
//! The document is always written whole; nothing here is incremental
//! across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::RouteHistoryEntry;

/// Number of destinations kept in `favorite_destinations`.
pub const MAX_FAVORITE_DESTINATIONS: usize = 5;

/// Summary metrics for a user.
///
/// Stored at: `user_metrics/{user_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    /// Time of the aggregation run that produced this document
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub last_active: DateTime<Utc>,
    /// Distance over the window (kilometers)
    pub recent_distance: f64,
    /// Duration over the window (minutes)
    pub recent_duration: f64,
    /// Most visited destinations, count descending
    #[serde(default)]
    pub favorite_destinations: Vec<FavoriteDestination>,
}

/// Destination visit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteDestination {
    pub place_id: String,
    pub count: u32,
}

/// Running totals over a set of route entries.
#[derive(Debug, Clone, Default)]
pub struct RouteTotals {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Destination tallies in first-encounter order
    destinations: Vec<FavoriteDestination>,
    destination_index: HashMap<String, usize>,
}

impl RouteTotals {
    /// Fold one route entry into the totals.
    pub fn add(&mut self, entry: &RouteHistoryEntry) {
        self.distance_meters += entry.distance_meters();
        self.duration_seconds += entry.duration_seconds();

        if let Some(place_id) = entry.destination() {
            match self.destination_index.get(place_id) {
                Some(&idx) => self.destinations[idx].count += 1,
                None => {
                    self.destination_index
                        .insert(place_id.to_string(), self.destinations.len());
                    self.destinations.push(FavoriteDestination {
                        place_id: place_id.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    /// Top destinations by count. Ties keep first-encounter order.
    pub fn favorite_destinations(&self, limit: usize) -> Vec<FavoriteDestination> {
        let mut ranked = self.destinations.clone();
        // `sort_by` is stable
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(limit);
        ranked
    }
}

impl UserMetrics {
    /// Compute metrics from the routes in the window.
    ///
    /// Returns `None` when there are no routes, in which case existing
    /// metrics must be left alone.
    pub fn from_routes(routes: &[RouteHistoryEntry], now: DateTime<Utc>) -> Option<Self> {
        if routes.is_empty() {
            return None;
        }

        let mut totals = RouteTotals::default();
        for route in routes {
            totals.add(route);
        }

        Some(Self {
            last_active: now,
            recent_distance: totals.distance_meters / 1000.0,
            recent_duration: totals.duration_seconds / 60.0,
            favorite_destinations: totals.favorite_destinations(MAX_FAVORITE_DESTINATIONS),
        })
    }
}
