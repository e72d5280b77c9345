// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolved caller identity published to handlers.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::claims::TokenClaims;
use super::error::AuthError;
use crate::models::{ApiKey, ApiKeyRecord, User};

/// Permission that grants everything to an API key.
pub const WILDCARD_PERMISSION: &str = "*";

/// Credential scheme that authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Jwt,
    ApiKey,
}

/// Identity attached to one request.
///
/// Inserted into request extensions by the auth middleware. Its absence
/// means no identity was resolved.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user: User,
    pub scheme: Scheme,
    /// Scope string of the token (JWT callers only).
    pub scope: Option<String>,
    /// Key used to authenticate (API-key callers only). Never has a hash.
    pub api_key: Option<ApiKey>,
}

impl CallerContext {
    pub fn from_token(user: User, claims: TokenClaims) -> Self {
        Self {
            user,
            scheme: Scheme::Jwt,
            scope: claims.scope,
            api_key: None,
        }
    }

    pub fn from_api_key(user: User, record: ApiKeyRecord) -> Self {
        Self {
            user,
            scheme: Scheme::ApiKey,
            scope: None,
            api_key: Some(ApiKey::from(record)),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Whether the caller may perform an operation needing `permission`.
    ///
    /// Token callers act as the user and are unrestricted; API-key callers
    /// are limited to the key's permission set.
    pub fn has_permission(&self, permission: &str) -> bool {
        match &self.api_key {
            None => true,
            Some(key) => key
                .permissions
                .iter()
                .any(|granted| granted == permission || granted == WILDCARD_PERMISSION),
        }
    }

    pub fn require_permission(&self, permission: &str) -> Result<(), AuthError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
