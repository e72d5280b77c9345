// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Records owned by the user directory and the API-key store, plus the
//! request/response bodies of the user and API-key endpoints.
//!
//! ## Secrets
//!
//! [`ApiKeyRecord`] carries the Argon2 hash of the key and is only ever
//! handled by the store and the validation path. Everything that leaves the
//! process goes through [`ApiKey`], which has no hash field at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Users
// =============================================================================

/// Local user identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct User {
    /// Local identifier.
    pub id: Uuid,
    /// Identity assigned by the token issuer (`sub` claim).
    pub external_id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Profile used when a user is first seen through a token.
///
/// The fields are provisional stand-ins until the user edits their profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderProfile {
    pub email: String,
    pub name: String,
    pub email_verified: bool,
}

impl PlaceholderProfile {
    /// Placeholder name given to users created on first sight.
    pub const NAME: &'static str = "Unknown User";

    /// Build the placeholder for an external identity.
    pub fn for_external_id(external_id: &str) -> Self {
        Self {
            email: format!("{external_id}@example.com"),
            name: Self::NAME.to_string(),
            email_verified: false,
        }
    }
}

/// Partial profile update (PUT /v1/users/me).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.picture.is_none() && self.email_verified.is_none()
    }
}

// =============================================================================
// API Keys
// =============================================================================

/// Stored API key, including the hash of its secret.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Human label.
    pub name: String,
    /// Argon2 PHC string of the full plaintext key.
    pub key_hash: String,
    /// First characters of the plaintext key, stored in clear for lookup.
    pub key_prefix: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Whether the key can still authenticate at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("key_hash", &"<redacted>")
            .field("key_prefix", &self.key_prefix)
            .field("permissions", &self.permissions)
            .field("expires_at", &self.expires_at)
            .field("last_used_at", &self.last_used_at)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Public view of an API key. Never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ApiKeyRecord> for ApiKey {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            name: record.name.clone(),
            key_prefix: record.key_prefix.clone(),
            permissions: record.permissions.clone(),
            expires_at: record.expires_at,
            last_used_at: record.last_used_at,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<ApiKeyRecord> for ApiKey {
    fn from(record: ApiKeyRecord) -> Self {
        ApiKey::from(&record)
    }
}

/// Request body for POST /v1/api-keys.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    /// Human label for the key.
    pub name: String,
    /// Permissions granted to the key. Defaults to `["read"]`.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Optional expiry (RFC 3339).
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response for POST /v1/api-keys.
///
/// `key` is the plaintext secret and is returned only here.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyResponse {
    pub api_key: ApiKey,
    pub key: String,
}

/// Response for GET /v1/api-keys.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyListResponse {
    pub api_keys: Vec<ApiKey>,
    pub count: usize,
}
