// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Establishes caller identity for every protected request using two
//! independent credential schemes.
//!
//! ## Auth Flow
//!
//! 1. The auth middleware for the route's policy reads the credential
//!    headers
//! 2. Bearer tokens:
//!    - Key set fetched from `https://{AUTH_DOMAIN}/.well-known/jwks.json`
//!      and cached until a lookup misses
//!    - Signature, expiry, audience and issuer verified
//!    - `sub` resolved to a local user, created on first sight
//! 3. API keys:
//!    - Candidates found by their 8-character prefix
//!    - Argon2id comparison against each candidate
//!    - Owner resolved to a local user (never created)
//! 4. The resulting `CallerContext` goes into the request extensions
//!
//! ## Security
//!
//! - Symmetric token algorithms are refused outright
//! - Every failure reaches the client as the same 401 body
//! - Plaintext API keys are shown once at creation and never stored
//! - Last-used and last-login stamps are written off the request path
//! - Clock skew tolerance is 60 seconds

pub mod api_keys;
pub mod authenticator;
pub mod claims;
pub mod context;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod middleware;
pub mod touch;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use api_keys::{ApiKeyHasher, ApiKeyService, ApiKeyStore, CreatedApiKey, NewApiKey};
pub use authenticator::{AuthPolicy, Authenticator, TrustConfig};
pub use claims::TokenClaims;
pub use context::{CallerContext, Scheme};
pub use error::AuthError;
pub use extractor::{Caller, OptionalCaller};
pub use identity::{IdentityResolver, UserDirectory};
pub use jwks::{HttpKeySetSource, JwksCache, KeySetSource, StaticKeySetSource};
pub use touch::{TouchEvent, TouchQueue, TouchWorker};
pub use verifier::TokenVerifier;
