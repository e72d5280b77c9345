// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chained Authenticator
//!
//! Turns request headers into a [`CallerContext`] under one of three
//! policies:
//!
//! | Policy | Schemes tried |
//! |---|---|
//! | `Jwt` | bearer token |
//! | `ApiKey` | API key |
//! | `Either` | bearer token, then API key |
//!
//! Each scheme attempt is independent: a bad bearer token never prevents a
//! valid API key from authenticating under `Either`. Every failure is
//! logged with its precise reason and returned as
//! [`AuthError::Unauthenticated`].
//!
//! ## Headers
//!
//! - `Authorization: Bearer <token>`
//! - `Authorization: ApiKey <key>` or `X-API-Key: <key>`
//!
//! Scheme names are case-insensitive.

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::api_keys::ApiKeyService;
use super::context::{CallerContext, Scheme};
use super::error::AuthError;
use super::identity::IdentityResolver;
use super::verifier::TokenVerifier;

/// Dedicated API-key header.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Trust parameters for bearer tokens.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Trust domain; tokens must be issued by `https://{domain}/`.
    pub domain: String,
    /// Audience tokens must be issued for.
    pub audience: String,
}

/// Request-level authentication policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Jwt,
    ApiKey,
    Either,
}

impl AuthPolicy {
    /// Schemes attempted, in order.
    pub fn schemes(self) -> &'static [Scheme] {
        match self {
            AuthPolicy::Jwt => &[Scheme::Jwt],
            AuthPolicy::ApiKey => &[Scheme::ApiKey],
            AuthPolicy::Either => &[Scheme::Jwt, Scheme::ApiKey],
        }
    }
}

/// Value of an `Authorization: <scheme> <value>` header.
fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Option<&'a str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (name, value) = header.split_once(' ')?;
    if !name.eq_ignore_ascii_case(scheme) || value.is_empty() || value.contains(' ') {
        return None;
    }
    Some(value)
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    authorization(headers, "bearer")
}

/// API key from `Authorization: ApiKey` or, failing that, `X-API-Key`.
pub fn api_key(headers: &HeaderMap) -> Option<&str> {
    authorization(headers, "apikey").or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

impl Scheme {
    /// Establish identity with this scheme alone.
    pub async fn authenticate(
        self,
        authenticator: &Authenticator,
        headers: &HeaderMap,
    ) -> Result<CallerContext, AuthError> {
        match self {
            Scheme::Jwt => {
                let token = bearer_token(headers).ok_or(AuthError::MissingCredential)?;
                let trust = &authenticator.trust;
                let claims = authenticator
                    .verifier
                    .verify(token, &trust.domain, &trust.audience)
                    .await?;
                let user = authenticator
                    .identity
                    .resolve_from_external_identity(&claims.sub)
                    .await?;
                Ok(CallerContext::from_token(user, claims))
            }
            Scheme::ApiKey => {
                let key = api_key(headers).ok_or(AuthError::MissingCredential)?;
                let (owner, record) = authenticator.api_keys.validate(key).await?;
                let user = authenticator.identity.resolve_owner(owner).await?;
                Ok(CallerContext::from_api_key(user, record))
            }
        }
    }
}

/// Runs authentication policies.
pub struct Authenticator {
    verifier: TokenVerifier,
    api_keys: Arc<ApiKeyService>,
    identity: Arc<IdentityResolver>,
    trust: TrustConfig,
}

impl Authenticator {
    pub fn new(
        verifier: TokenVerifier,
        api_keys: Arc<ApiKeyService>,
        identity: Arc<IdentityResolver>,
        trust: TrustConfig,
    ) -> Self {
        Self {
            verifier,
            api_keys,
            identity,
            trust,
        }
    }

    pub fn trust(&self) -> &TrustConfig {
        &self.trust
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Authenticate `headers` under `policy`.
    ///
    /// Gives up as soon as `cancel` fires, dropping any outstanding key-set
    /// fetch or store query.
    pub async fn authenticate(
        &self,
        policy: AuthPolicy,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<CallerContext, AuthError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let reason = AuthError::Cancelled;
                debug!(?policy, code = reason.error_code(), "{reason}");
                Err(AuthError::Unauthenticated)
            }
            result = self.run(policy, headers) => result,
        }
    }

    async fn run(&self, policy: AuthPolicy, headers: &HeaderMap) -> Result<CallerContext, AuthError> {
        for scheme in policy.schemes() {
            match scheme.authenticate(self, headers).await {
                Ok(ctx) => {
                    debug!(?scheme, user_id = %ctx.user_id(), "Request authenticated");
                    return Ok(ctx);
                }
                Err(e) if e.is_infrastructure() => {
                    warn!(?scheme, error = %e, code = e.error_code(), "Authentication attempt failed");
                }
                Err(e) => {
                    debug!(?scheme, code = e.error_code(), "Authentication attempt failed");
                }
            }
        }
        Err(AuthError::Unauthenticated)
    }
}
