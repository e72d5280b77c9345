// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Keys
//!
//! Opaque bearer secrets of the form `sk_` + 64 hex characters (32 bytes from
//! the OS RNG). The first 8 characters are stored in clear as a lookup prefix;
//! the full key is stored only as an Argon2id PHC string.
//!
//! ## Validation
//!
//! 1. Cut the prefix (shorter input is `MalformedKey`)
//! 2. Load every active, unexpired record sharing that prefix
//! 3. Argon2-verify the input against each candidate, first match wins
//! 4. Queue a last-used stamp; the caller never waits on it
//!
//! Hashing and verification run on the blocking pool.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng as SaltRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::AuthError;
use super::touch::{TouchEvent, TouchQueue};
use crate::models::{ApiKey, ApiKeyRecord};
use crate::storage::StorageResult;

/// Tag every generated key starts with.
pub const KEY_TAG: &str = "sk_";
/// Number of leading characters stored in clear.
pub const PREFIX_LEN: usize = 8;
/// Random bytes behind each key.
const SECRET_BYTES: usize = 32;
/// Permissions granted when the creator asks for none.
pub const DEFAULT_PERMISSIONS: &[&str] = &["read"];

/// Default Argon2 memory cost (KiB).
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19_456;
/// Default Argon2 iteration count.
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;

/// Backing store for API-key records.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Persist a new record.
    async fn insert(&self, record: &ApiKeyRecord) -> StorageResult<()>;

    /// Active, unexpired records whose prefix equals `prefix`.
    async fn find_active_by_prefix(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<ApiKeyRecord>>;

    /// All records of `owner`, newest first.
    async fn list_for_owner(&self, owner: Uuid) -> StorageResult<Vec<ApiKeyRecord>>;

    /// Mark a key inactive. `false` when the key is absent or not `owner`'s.
    async fn deactivate(&self, owner: Uuid, key_id: Uuid) -> StorageResult<bool>;

    /// Record a successful use. Never moves the timestamp backwards.
    async fn touch_last_used(&self, key_id: Uuid, at: DateTime<Utc>) -> StorageResult<()>;
}

/// Produce a fresh plaintext key and its lookup prefix.
pub fn generate() -> (String, String) {
    let mut secret = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut secret);

    let key = format!("{KEY_TAG}{}", hex::encode(secret));
    let prefix = key[..PREFIX_LEN].to_string();
    (key, prefix)
}

/// Lookup prefix of a presented key.
pub fn prefix_of(key: &str) -> Result<&str, AuthError> {
    key.get(..PREFIX_LEN).ok_or(AuthError::MalformedKey)
}

/// Argon2id hasher with a tunable cost.
#[derive(Debug, Clone)]
pub struct ApiKeyHasher {
    params: Params,
}

impl Default for ApiKeyHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl ApiKeyHasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, argon2::Error> {
        Ok(Self {
            params: Params::new(memory_kib, iterations, 1, None)?,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Salted PHC hash of `plaintext`.
    pub async fn hash(&self, plaintext: String) -> Result<String, AuthError> {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut SaltRng);
            argon2
                .hash_password(plaintext.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::Internal(format!("hashing failed: {e}")))
    }

    /// Whether `plaintext` matches `phc`. Unparseable hashes never match.
    ///
    /// The cost parameters embedded in `phc` are used, so keys hashed under
    /// an older cost keep validating.
    pub async fn verify(&self, plaintext: String, phc: String) -> bool {
        let argon2 = self.argon2();
        tokio::task::spawn_blocking(move || {
            PasswordHash::new(&phc)
                .map(|parsed| argon2.verify_password(plaintext.as_bytes(), &parsed).is_ok())
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

/// Input for [`ApiKeyService::create`].
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly created key. `plaintext` exists only in this value.
pub struct CreatedApiKey {
    pub record: ApiKeyRecord,
    pub plaintext: String,
}

/// Generates, persists, validates and revokes API keys.
pub struct ApiKeyService {
    store: Arc<dyn ApiKeyStore>,
    hasher: ApiKeyHasher,
    touch: TouchQueue,
}

impl ApiKeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>, hasher: ApiKeyHasher, touch: TouchQueue) -> Self {
        Self {
            store,
            hasher,
            touch,
        }
    }

    /// Create a key for `owner`.
    pub async fn create(&self, owner: Uuid, request: NewApiKey) -> Result<CreatedApiKey, AuthError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidRequest("name is required".to_string()));
        }

        let now = Utc::now();
        if request.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AuthError::InvalidRequest(
                "expires_at must be in the future".to_string(),
            ));
        }

        let permissions = if request.permissions.is_empty() {
            DEFAULT_PERMISSIONS.iter().map(|p| p.to_string()).collect()
        } else {
            request.permissions
        };

        let (plaintext, prefix) = generate();
        let key_hash = self.hasher.hash(plaintext.clone()).await?;

        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            user_id: owner,
            name: name.to_string(),
            key_hash,
            key_prefix: prefix,
            permissions,
            expires_at: request.expires_at,
            last_used_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&record).await?;

        info!(
            key_id = %record.id,
            user_id = %owner,
            prefix = %record.key_prefix,
            "Created API key"
        );
        Ok(CreatedApiKey { record, plaintext })
    }

    /// Resolve a presented key to its record.
    pub async fn validate(&self, plaintext: &str) -> Result<(Uuid, ApiKeyRecord), AuthError> {
        let prefix = prefix_of(plaintext)?;
        let now = Utc::now();

        let candidates = self.store.find_active_by_prefix(prefix, now).await?;
        debug!(prefix, candidates = candidates.len(), "Validating API key");

        for candidate in candidates {
            if self
                .hasher
                .verify(plaintext.to_string(), candidate.key_hash.clone())
                .await
            {
                self.touch.send(TouchEvent::ApiKeyUsed {
                    key_id: candidate.id,
                    at: now,
                });
                return Ok((candidate.user_id, candidate));
            }
        }

        Err(AuthError::InvalidKey)
    }

    /// Deactivate `key_id` if `owner` owns it.
    ///
    /// A foreign key and a missing key are both `NotFound`.
    pub async fn revoke(&self, owner: Uuid, key_id: Uuid) -> Result<(), AuthError> {
        if !self.store.deactivate(owner, key_id).await? {
            return Err(AuthError::NotFound);
        }
        info!(key_id = %key_id, user_id = %owner, "Revoked API key");
        Ok(())
    }

    /// Keys of `owner`, newest first, without hashes.
    pub async fn list(&self, owner: Uuid) -> Result<Vec<ApiKey>, AuthError> {
        let records = self.store.list_for_owner(owner).await?;
        Ok(records.into_iter().map(ApiKey::from).collect())
    }
}
