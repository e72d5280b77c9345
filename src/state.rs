// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared application state handed to every handler and auth middleware.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::touch::DEFAULT_QUEUE_CAPACITY;
use crate::auth::{
    ApiKeyHasher, ApiKeyService, Authenticator, IdentityResolver, JwksCache, KeySetSource,
    TokenVerifier, TouchWorker, TrustConfig, UserDirectory,
};
use crate::config::AppConfig;
use crate::storage::{ApiKeyRepository, JsonStorage, StorageError, StoragePaths, UserRepository};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Storage initialization failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid API key hash parameters: {0}")]
    HashParams(String),
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<JsonStorage>,
    pub users: Arc<dyn UserDirectory>,
    pub api_keys: Arc<ApiKeyService>,
    pub authenticator: Arc<Authenticator>,
    /// Server-wide shutdown signal. Auth middleware runs under child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire storage, the auth services and the touch worker.
    ///
    /// Returns the worker's handle so the caller can wait for it to drain
    /// after `shutdown` fires.
    pub fn new(
        config: &AppConfig,
        key_source: Arc<dyn KeySetSource>,
        shutdown: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), StateError> {
        let mut storage = JsonStorage::new(StoragePaths::new(&config.data_dir));
        storage.initialize()?;
        let storage = Arc::new(storage);
        info!(data_dir = %config.data_dir.display(), "Storage initialized");

        let users = Arc::new(UserRepository::new(storage.clone()));
        let key_store = Arc::new(ApiKeyRepository::new(storage.clone()));

        let (touch, worker) = TouchWorker::spawn(
            users.clone(),
            key_store.clone(),
            DEFAULT_QUEUE_CAPACITY,
            shutdown.clone(),
        );

        let hasher = ApiKeyHasher::new(config.hash_memory_kib, config.hash_iterations)
            .map_err(|e| StateError::HashParams(e.to_string()))?;
        let api_keys = Arc::new(ApiKeyService::new(key_store, hasher, touch.clone()));
        let identity = Arc::new(IdentityResolver::new(users.clone(), touch));

        let mut cache = JwksCache::new(key_source);
        if let Some(url) = &config.jwks_url {
            info!(jwks_url = %url, "Using configured JWKS endpoint");
            cache = cache.with_url_override(url.clone());
        }
        let verifier = TokenVerifier::new(Arc::new(cache)).with_leeway(config.leeway_secs);

        let authenticator = Arc::new(Authenticator::new(
            verifier,
            api_keys.clone(),
            identity,
            TrustConfig {
                domain: config.auth_domain.clone(),
                audience: config.auth_audience.clone(),
            },
        ));

        info!(
            domain = %config.auth_domain,
            audience = %config.auth_audience,
            "Authentication configured"
        );

        let state = Self {
            storage,
            users,
            api_keys,
            authenticator,
            shutdown,
        };
        Ok((state, worker))
    }
}
