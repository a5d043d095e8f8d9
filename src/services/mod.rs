// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod aggregator;
pub mod id_token;
pub mod identity;

pub use account::{AccountDeleter, DeleteAccountOutcome};
pub use aggregator::{AggregationReport, RouteAggregator};
pub use id_token::{IdTokenVerifier, OidcError, TokenProfile, VerifiedToken};
pub use identity::{FirebaseAuthClient, IdentityProvider};
