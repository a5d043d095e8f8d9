// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase ID token middleware for callable endpoints.
//!
//! Unlike a hard auth gate, this never rejects a request for lacking a
//! valid token. It records who the caller is (or that there is none) and
//! leaves the decision to the handler, which reports `UNAUTHENTICATED`
//! in the callable error format.

use crate::error::AppError;
use crate::services::OidcError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated user extracted from a Firebase ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

/// Caller identity attached to every callable request.
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<AuthUser>);

impl Caller {
    pub fn uid(&self) -> Option<&str> {
        self.0.as_ref().map(|user| user.uid.as_str())
    }
}

/// Middleware that resolves the caller from the Authorization header.
pub async fn attach_caller(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request.headers().get(header::AUTHORIZATION);

    let caller = if auth_header.is_none() {
        Caller(None)
    } else {
        match state.user_verifier.verify(auth_header).await {
            Ok(token) => Caller(Some(AuthUser {
                uid: token.subject,
            })),
            Err(OidcError::Forbidden(reason)) => {
                tracing::warn!(reason = %reason, "Rejected Firebase ID token");
                Caller(None)
            }
            Err(OidcError::Transient(reason)) => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "ID token verification unavailable: {reason}"
                )));
            }
        }
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
