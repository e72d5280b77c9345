// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository: the file-backed [`UserDirectory`].
//!
//! Users are stored under `users/{user_id}.json`. A second directory,
//! `users-by-external/`, maps the SHA-256 of each external identity to the
//! local user id and is what makes first-sight creation idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::UserDirectory;
use crate::models::{PlaceholderProfile, ProfileUpdate, User};

use super::super::{JsonStorage, StorageError, StorageResult};

/// Index entry stored under `users-by-external/`.
#[derive(Debug, Serialize, Deserialize)]
struct ExternalIndexEntry {
    user_id: Uuid,
}

/// Repository for user records.
pub struct UserRepository {
    storage: Arc<JsonStorage>,
    /// Serializes read-modify-write cycles on user records.
    write_lock: Mutex<()>,
}

impl UserRepository {
    /// Create a new UserRepository.
    pub fn new(storage: Arc<JsonStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn get(&self, user_id: &Uuid) -> StorageResult<Option<User>> {
        self.storage.read_json_opt(self.storage.paths().user(user_id))
    }

    fn require(&self, user_id: &Uuid) -> StorageResult<User> {
        self.get(user_id)?
            .ok_or_else(|| StorageError::NotFound(format!("User {user_id}")))
    }

    fn lookup_external(&self, external_id: &str) -> StorageResult<Option<User>> {
        let entry: Option<ExternalIndexEntry> = self
            .storage
            .read_json_opt(self.storage.paths().external_index(external_id))?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        Ok(self
            .get(&entry.user_id)?
            .filter(|user| user.external_id == external_id))
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<User>> {
        self.lookup_external(external_id)
    }

    async fn find_by_id(&self, user_id: Uuid) -> StorageResult<Option<User>> {
        self.get(&user_id)
    }

    async fn create(&self, external_id: &str, profile: PlaceholderProfile) -> StorageResult<User> {
        let _guard = self.write_lock.lock().await;

        if self.lookup_external(external_id)?.is_some() {
            return Err(StorageError::AlreadyExists(
                "User for external identity".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            email: profile.email,
            name: profile.name,
            picture: None,
            email_verified: profile.email_verified,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
        };

        // Record first, index second: the index never points at nothing.
        self.storage
            .write_json(self.storage.paths().user(&user.id), &user)?;
        self.storage.write_json(
            self.storage.paths().external_index(external_id),
            &ExternalIndexEntry { user_id: user.id },
        )?;

        Ok(user)
    }

    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut user = self.require(&user_id)?;
        // Touches arrive unordered; never move the marker backwards.
        if user.last_login_at.is_some_and(|current| current >= at) {
            return Ok(());
        }
        user.last_login_at = Some(at);

        self.storage.write_json(self.storage.paths().user(&user_id), &user)
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> StorageResult<User> {
        let _guard = self.write_lock.lock().await;

        let mut user = self.require(&user_id)?;
        if update.is_empty() {
            return Ok(user);
        }

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(picture) = update.picture {
            user.picture = Some(picture);
        }
        if let Some(email_verified) = update.email_verified {
            user.email_verified = email_verified;
        }
        user.updated_at = Utc::now();

        self.storage
            .write_json(self.storage.paths().user(&user_id), &user)?;
        Ok(user)
    }
}
