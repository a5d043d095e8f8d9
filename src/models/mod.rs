// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod metrics;
pub mod route;
pub mod user;

pub use metrics::{FavoriteDestination, RouteTotals, UserMetrics};
pub use route::{EndLocation, Measurement, RouteHistoryEntry};
pub use user::User;
