// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Scheduler authentication middleware.

use crate::config::SCHEDULER_HEADER;
use crate::services::OidcError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require the scheduler header + a valid scheduler OIDC token for `/tasks/*` routes.
pub async fn require_scheduler_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let scheduler_header = request.headers().get(SCHEDULER_HEADER);
    let from_scheduler = scheduler_header
        .and_then(|h| h.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if !from_scheduler {
        tracing::warn!(
            header = ?scheduler_header,
            path = %request.uri().path(),
            "Blocked tasks request without scheduler header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    let auth_header = request.headers().get(header::AUTHORIZATION);

    let principal = state
        .scheduler_verifier
        .verify(auth_header)
        .await
        .map_err(|err| match err {
            OidcError::Forbidden(reason) => {
                tracing::warn!(reason = %reason, "Blocked tasks request: invalid OIDC token");
                StatusCode::FORBIDDEN
            }
            OidcError::Transient(reason) => {
                tracing::error!(reason = %reason, "Scheduler OIDC verification transient failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    tracing::debug!(
        email = principal.email.as_deref().unwrap_or("<missing>"),
        subject = %principal.subject,
        audience = %principal.audience,
        "Cloud Scheduler OIDC verification succeeded"
    );

    Ok(next.run(request).await)
}
