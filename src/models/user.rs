// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile model.

use serde::{Deserialize, Serialize};

/// Root user profile stored at `users/{user_id}`.
///
/// Written by the app itself; the backend only reads the activity flag.
/// Fields it does not know about are ignored on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    /// Whether the user is included in scheduled route aggregation
    #[serde(default)]
    pub is_active: bool,
}
