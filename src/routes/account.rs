// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Callable account routes.
//!
//! These follow the Firebase callable protocol: the request body is
//! `{"data": ...}`, a success is `{"result": ...}` and a failure is
//! `{"error": {"status", "message"}}` (see `AppError`).

use crate::error::{AppError, Result};
use crate::middleware::auth::Caller;
use crate::services::AccountDeleter;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Callable routes (caller identity is attached in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/deleteUserAccount", post(delete_user_account))
}

/// Callable request envelope.
#[derive(Debug, Deserialize)]
pub struct CallableRequest<T> {
    pub data: T,
}

/// Callable success envelope.
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountData {
    #[serde(rename = "userId", default)]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the caller's own account and all of its data.
async fn delete_user_account(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: std::result::Result<Json<CallableRequest<DeleteAccountData>>, JsonRejection>,
) -> Result<Json<CallableResponse<DeleteAccountResponse>>> {
    let request = match payload {
        Ok(Json(request)) => request,
        // Authentication is reported ahead of a malformed body.
        Err(_) if caller.uid().is_none() => return Err(AppError::Unauthenticated),
        Err(rejection) => {
            return Err(AppError::BadRequest(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    };

    let deleter = AccountDeleter::new(state.store.clone(), state.identity.clone());
    deleter.delete(caller.uid(), &request.data.user_id).await?;

    Ok(Json(CallableResponse {
        result: DeleteAccountResponse {
            success: true,
            message: "Account deleted successfully".to_string(),
        },
    }))
}
