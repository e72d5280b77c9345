// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity resolution: external identity or key owner to local user.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::AuthError;
use super::touch::{TouchEvent, TouchQueue};
use crate::models::{PlaceholderProfile, ProfileUpdate, User};
use crate::storage::{StorageError, StorageResult};

/// Directory of local users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<User>>;

    async fn find_by_id(&self, user_id: Uuid) -> StorageResult<Option<User>>;

    /// Create a user for `external_id`.
    ///
    /// Fails with [`StorageError::AlreadyExists`] when one already exists.
    async fn create(&self, external_id: &str, profile: PlaceholderProfile) -> StorageResult<User>;

    /// Stamp a login. Never moves the timestamp backwards.
    async fn touch_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StorageResult<()>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> StorageResult<User>;
}

/// Maps verified credentials to local users.
pub struct IdentityResolver {
    directory: Arc<dyn UserDirectory>,
    touch: TouchQueue,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn UserDirectory>, touch: TouchQueue) -> Self {
        Self { directory, touch }
    }

    /// Resolve a token subject, creating a placeholder user on first sight.
    ///
    /// An existing user gets a queued last-login stamp; the returned value
    /// already carries it.
    pub async fn resolve_from_external_identity(&self, external_id: &str) -> Result<User, AuthError> {
        if let Some(user) = self.directory.find_by_external_id(external_id).await? {
            return Ok(self.stamp_login(user));
        }

        let profile = PlaceholderProfile::for_external_id(external_id);
        match self.directory.create(external_id, profile).await {
            Ok(user) => {
                info!(user_id = %user.id, "Created user on first authentication");
                Ok(user)
            }
            Err(StorageError::AlreadyExists(_)) => {
                // Lost a creation race; the winner's record is authoritative.
                debug!("Concurrent first authentication, re-reading user");
                let user = self
                    .directory
                    .find_by_external_id(external_id)
                    .await?
                    .ok_or_else(|| {
                        AuthError::Internal("user vanished after concurrent create".to_string())
                    })?;
                Ok(self.stamp_login(user))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the owner of a validated API key. Never creates users.
    pub async fn resolve_owner(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidKey)
    }

    fn stamp_login(&self, mut user: User) -> User {
        let mut at = Utc::now();
        if let Some(previous) = user.last_login_at {
            // Strictly later than what the caller may have seen before
            if at <= previous {
                at = previous + chrono::Duration::microseconds(1);
            }
        }
        self.touch.send(TouchEvent::UserLogin {
            user_id: user.id,
            at,
        });
        user.last_login_at = Some(at);
        user
    }
}
