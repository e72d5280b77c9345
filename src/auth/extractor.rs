// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the resolved caller.
//!
//! Use `Caller` in handlers mounted behind one of the auth middleware
//! functions:
//!
//! ```rust,ignore
//! async fn me(Caller(ctx): Caller) -> Json<User> {
//!     Json(ctx.user)
//! }
//! ```

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::error;

use super::context::CallerContext;
use super::error::AuthError;

/// The authenticated caller. Rejects with 401 when no identity was resolved.
pub struct Caller(pub CallerContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CallerContext>().cloned() {
            Some(ctx) => Ok(Caller(ctx)),
            None => {
                // Handler mounted without an auth middleware
                error!(path = %parts.uri.path(), "No caller context on request");
                Err(AuthError::Unauthenticated)
            }
        }
    }
}

/// The caller, if one was resolved.
pub struct OptionalCaller(pub Option<CallerContext>);

impl<S> FromRequestParts<S> for OptionalCaller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalCaller(parts.extensions.get::<CallerContext>().cloned()))
    }
}
