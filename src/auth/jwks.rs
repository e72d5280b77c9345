// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Behaviour
//!
//! - One key set per trust domain, fetched from
//!   `https://{domain}/.well-known/jwks.json` on first use
//! - A lookup miss replaces the whole set with a fresh fetch and retries once
//! - No TTL and no background refresh; a rotated key is picked up the first
//!   time a token presents its `kid`
//! - Concurrent misses may fetch twice; the last writer wins
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS only (plain HTTP is allowed for `localhost`)
//! - Keys without a `kid` are ignored

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use super::error::AuthError;

/// Path of the key-set document under a trust domain.
pub const WELL_KNOWN_JWKS_PATH: &str = "/.well-known/jwks.json";

/// HTTP client timeout for key-set fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can produce the raw key-set document for a URL.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<JwkSet, AuthError>;
}

/// Production source: HTTPS GET with reqwest.
#[derive(Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new() -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AuthError::KeySetUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self, url: &Url) -> Result<JwkSet, AuthError> {
        if url.scheme() != "https" && !(url.scheme() == "http" && is_loopback(url)) {
            return Err(AuthError::KeySetUnavailable(format!(
                "refusing non-HTTPS JWKS URL {url}"
            )));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySetUnavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))
    }
}

/// In-memory source serving a fixed document.
///
/// Used in tests and for deployments that pin their keys. Counts fetches so
/// refresh behaviour can be observed.
#[derive(Default)]
pub struct StaticKeySetSource {
    set: RwLock<Option<JwkSet>>,
    fetches: AtomicUsize,
}

impl StaticKeySetSource {
    pub fn new(set: JwkSet) -> Self {
        Self {
            set: RwLock::new(Some(set)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose every fetch fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Swap the served document (simulates provider-side key rotation).
    pub async fn replace(&self, set: JwkSet) {
        *self.set.write().await = Some(set);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self, _url: &Url) -> Result<JwkSet, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.set
            .read()
            .await
            .clone()
            .ok_or_else(|| AuthError::KeySetUnavailable("no key set configured".to_string()))
    }
}

/// One fetched key set.
#[derive(Debug)]
pub struct KeySet {
    keys: HashMap<String, Jwk>,
    fetched_at: DateTime<Utc>,
    source_url: Url,
}

impl KeySet {
    fn new(jwks: JwkSet, source_url: Url) -> Self {
        let keys = jwks
            .keys
            .into_iter()
            .filter_map(|jwk| jwk.common.key_id.clone().map(|kid| (kid, jwk)))
            .collect();
        Self {
            keys,
            fetched_at: Utc::now(),
            source_url,
        }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }
}

/// Key-set cache shared by every verification in the process.
pub struct JwksCache {
    source: Arc<dyn KeySetSource>,
    url_override: Option<Url>,
    sets: RwLock<HashMap<String, Arc<KeySet>>>,
}

impl JwksCache {
    pub fn new(source: Arc<dyn KeySetSource>) -> Self {
        Self {
            source,
            url_override: None,
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch from `url` instead of the domain's well-known location.
    pub fn with_url_override(mut self, url: Url) -> Self {
        self.url_override = Some(url);
        self
    }

    /// Where the key set of `domain` is fetched from.
    pub fn jwks_url(&self, domain: &str) -> Result<Url, AuthError> {
        if let Some(url) = &self.url_override {
            return Ok(url.clone());
        }

        let invalid = || AuthError::KeySetUnavailable(format!("invalid trust domain {domain:?}"));
        let url = Url::parse(&format!("https://{domain}{WELL_KNOWN_JWKS_PATH}"))
            .map_err(|_| invalid())?;

        // The domain must be a bare host[:port].
        if url.path() != WELL_KNOWN_JWKS_PATH
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
            || url.host_str().is_none()
        {
            return Err(invalid());
        }
        Ok(url)
    }

    async fn cached(&self, domain: &str) -> Option<Arc<KeySet>> {
        self.sets.read().await.get(domain).cloned()
    }

    /// Resolve the public key `kid` of `domain`.
    pub async fn get_key(&self, domain: &str, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(set) = self.cached(domain).await {
            if let Some(jwk) = set.get(kid) {
                return Ok(jwk.clone());
            }
            debug!(domain, kid, "Key id not in cached key set, refreshing");
        }

        let set = self.refresh(domain).await?;
        set.get(kid).cloned().ok_or(AuthError::KeyNotFound)
    }

    /// Fetch the key set of `domain` and replace the cached one.
    pub async fn refresh(&self, domain: &str) -> Result<Arc<KeySet>, AuthError> {
        let url = self.jwks_url(domain)?;
        let jwks = self.source.fetch(&url).await?;
        let set = Arc::new(KeySet::new(jwks, url));

        self.sets
            .write()
            .await
            .insert(domain.to_string(), Arc::clone(&set));

        info!(
            domain,
            keys = set.len(),
            url = %set.source_url(),
            "Fetched signing key set"
        );
        Ok(set)
    }

    /// When the cached key set of `domain` was fetched, if there is one.
    pub async fn fetched_at(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.cached(domain).await.map(|set| set.fetched_at())
    }
}
