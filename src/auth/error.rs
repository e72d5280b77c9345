// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Each variant names the exact step that failed. That detail is for logs
//! only: at the policy boundary everything except [`AuthError::Forbidden`],
//! [`AuthError::NotFound`] and [`AuthError::InvalidRequest`] is collapsed to
//! [`AuthError::Unauthenticated`], and the response body never says which
//! scheme or check rejected the request.

use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::storage::StorageError;

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential for the scheme was presented
    #[error("No credential presented")]
    MissingCredential,
    /// The signing-key set could not be fetched or parsed
    #[error("Signing key set unavailable: {0}")]
    KeySetUnavailable(String),
    /// The key id is absent even after a fresh fetch
    #[error("No signing key matches the token key id")]
    KeyNotFound,
    /// Token header carries no `kid`
    #[error("Token header has no key id")]
    MissingKeyId,
    /// Token uses a symmetric or unknown algorithm
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Token is malformed
    #[error("Token is malformed")]
    MalformedToken,
    /// Token signature is invalid
    #[error("Token signature is invalid")]
    BadSignature,
    /// Token has expired
    #[error("Token has expired")]
    TokenExpired,
    /// Token is not yet valid
    #[error("Token is not yet valid")]
    TokenNotYetValid,
    /// Token audience does not include ours
    #[error("Token audience is invalid")]
    InvalidAudience,
    /// Token issuer is not the trust domain
    #[error("Token issuer is invalid")]
    InvalidIssuer,
    /// API key is too short to carry a prefix
    #[error("API key is malformed")]
    MalformedKey,
    /// No active key matches the presented secret
    #[error("API key is invalid")]
    InvalidKey,
    /// Resource absent or owned by someone else
    #[error("Not found")]
    NotFound,
    /// Caller input rejected before any credential work
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Authenticated, but the credential lacks a permission
    #[error("Insufficient permissions for this operation")]
    Forbidden,
    /// The caller gave up before authentication finished
    #[error("Authentication cancelled")]
    Cancelled,
    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Unexpected failure inside the auth layer
    #[error("Internal authentication error: {0}")]
    Internal(String),
    /// Terminal, chain-level failure
    #[error("Authentication required")]
    Unauthenticated,
}

impl AuthError {
    /// Get the diagnostic code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            AuthError::MalformedToken => "malformed_token",
            AuthError::BadSignature => "bad_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::MalformedKey => "malformed_key",
            AuthError::InvalidKey => "invalid_key",
            AuthError::NotFound => "not_found",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::Forbidden => "forbidden",
            AuthError::Cancelled => "cancelled",
            AuthError::Storage(_) => "storage_error",
            AuthError::Internal(_) => "internal_error",
            AuthError::Unauthenticated => "unauthenticated",
        }
    }

    /// Failures of our own dependencies rather than of the credential.
    ///
    /// Logged at `warn` instead of `debug`.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::KeySetUnavailable(_) | AuthError::Storage(_) | AuthError::Internal(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
