// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! One middleware function per policy. On success the resolved
//! [`CallerContext`](super::CallerContext) is inserted into the request
//! extensions; on failure the request is answered with the generic 401.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/v1/users/me", get(me))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_jwt));
//! ```
//!
//! Each evaluation runs under a child of the application shutdown token.
//! That token fires only once the listener has stopped, so requests in
//! flight during the grace period authenticate normally; cancelling it
//! aborts outstanding key-set fetches and store queries. A client
//! disconnect drops the request future, which has the same effect.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::authenticator::AuthPolicy;
use super::error::AuthError;
use crate::state::AppState;

async fn authenticate_with(
    policy: AuthPolicy,
    state: AppState,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let cancel = state.shutdown.child_token();
    let ctx = state
        .authenticator
        .authenticate(policy, request.headers(), &cancel)
        .await?;

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Bearer token only.
pub async fn require_jwt(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate_with(AuthPolicy::Jwt, state, request, next).await
}

/// API key only.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate_with(AuthPolicy::ApiKey, state, request, next).await
}

/// Bearer token, falling back to API key.
pub async fn require_any(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate_with(AuthPolicy::Either, state, request, next).await
}
