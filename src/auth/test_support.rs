// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for auth unit tests: RSA signing keys, token minting and a
//! fully wired set of services over temporary storage.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::api_keys::{ApiKeyHasher, ApiKeyService, CreatedApiKey, NewApiKey};
use super::authenticator::{Authenticator, TrustConfig};
use super::identity::{IdentityResolver, UserDirectory};
use super::jwks::{JwksCache, StaticKeySetSource};
use super::touch::TouchWorker;
use super::verifier::TokenVerifier;
use crate::models::{PlaceholderProfile, User};
use crate::state::AppState;
use crate::storage::{ApiKeyRepository, JsonStorage, StoragePaths, UserRepository};

pub const TEST_KID: &str = "test-key-1";
pub const TEST_DOMAIN: &str = "tenant.example.com";
pub const TEST_AUDIENCE: &str = "https://api.reminders.test";

struct TestKey {
    pem: String,
    n: String,
    e: String,
}

impl TestKey {
    fn generate() -> Self {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("RSA keygen");
        let pem = private
            .to_pkcs1_pem(LineEnding::LF)
            .expect("PKCS#1 PEM")
            .to_string();
        Self {
            pem,
            n: URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
        }
    }
}

fn trusted_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

fn untrusted_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(TestKey::generate)
}

/// Which private key signs a minted token.
#[derive(Debug, Clone, Copy)]
pub enum TestSigner {
    /// The key published in the test key set.
    Trusted,
    /// A key nobody publishes.
    Untrusted,
}

/// Public JWK of the trusted key under `kid`.
pub fn rsa_jwk(kid: &str) -> Jwk {
    let key = trusted_key();
    serde_json::from_value(json!({
        "kty": "RSA",
        "kid": kid,
        "use": "sig",
        "alg": "RS256",
        "n": key.n,
        "e": key.e,
    }))
    .expect("valid RSA JWK")
}

/// Key set containing the trusted key under [`TEST_KID`].
pub fn test_jwks() -> JwkSet {
    JwkSet {
        keys: vec![rsa_jwk(TEST_KID)],
    }
}

/// Claims that pass every check for [`TEST_DOMAIN`] / [`TEST_AUDIENCE`].
pub fn claims_for(sub: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": sub,
        "iss": format!("https://{TEST_DOMAIN}/"),
        "aud": [TEST_AUDIENCE, format!("https://{TEST_DOMAIN}/userinfo")],
        "iat": now,
        "exp": now + 3600,
        "scope": "openid profile",
    })
}

/// RS256 token.
pub fn mint(claims: &Value, kid: Option<&str>, signer: TestSigner) -> String {
    let key = match signer {
        TestSigner::Trusted => trusted_key(),
        TestSigner::Untrusted => untrusted_key(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let encoding_key = EncodingKey::from_rsa_pem(key.pem.as_bytes()).expect("RSA PEM");
    encode(&header, claims, &encoding_key).expect("token encoding")
}

/// RS256 token with [`TEST_KID`] signed by the trusted key.
pub fn mint_token(claims: &Value) -> String {
    mint(claims, Some(TEST_KID), TestSigner::Trusted)
}

/// HS256 token keyed with the trusted public modulus.
pub fn mint_hs256(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_string());
    let secret = EncodingKey::from_secret(trusted_key().n.as_bytes());
    encode(&header, claims, &secret).expect("token encoding")
}

/// Poll `check` for up to two seconds.
pub async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Every auth service wired over a temporary directory.
pub struct TestServices {
    pub storage: Arc<JsonStorage>,
    pub users: Arc<UserRepository>,
    pub key_store: Arc<ApiKeyRepository>,
    pub api_keys: Arc<ApiKeyService>,
    pub identity: Arc<IdentityResolver>,
    pub authenticator: Arc<Authenticator>,
    pub key_source: Arc<StaticKeySetSource>,
    shutdown: CancellationToken,
    _dir: TempDir,
}

impl TestServices {
    pub async fn new() -> Self {
        Self::with_source(StaticKeySetSource::new(test_jwks())).await
    }

    /// Services whose issuer serves no key set.
    pub async fn with_unavailable_keys() -> Self {
        Self::with_source(StaticKeySetSource::unavailable()).await
    }

    async fn with_source(key_source: StaticKeySetSource) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("Failed to initialize");
        let storage = Arc::new(storage);

        let users = Arc::new(UserRepository::new(storage.clone()));
        let key_store = Arc::new(ApiKeyRepository::new(storage.clone()));

        let shutdown = CancellationToken::new();
        let (touch, _handle) =
            TouchWorker::spawn(users.clone(), key_store.clone(), 64, shutdown.clone());

        let hasher = ApiKeyHasher::new(64, 1).expect("argon2 params");
        let api_keys = Arc::new(ApiKeyService::new(key_store.clone(), hasher, touch.clone()));
        let identity = Arc::new(IdentityResolver::new(users.clone(), touch));

        let key_source = Arc::new(key_source);
        let cache = Arc::new(JwksCache::new(key_source.clone()));
        let authenticator = Arc::new(Authenticator::new(
            TokenVerifier::new(cache),
            api_keys.clone(),
            identity.clone(),
            TrustConfig {
                domain: TEST_DOMAIN.to_string(),
                audience: TEST_AUDIENCE.to_string(),
            },
        ));

        Self {
            storage,
            users,
            key_store,
            api_keys,
            identity,
            authenticator,
            key_source,
            shutdown,
            _dir: dir,
        }
    }

    /// Application state over these services.
    pub fn app_state(&self) -> AppState {
        AppState {
            storage: self.storage.clone(),
            users: self.users.clone(),
            api_keys: self.api_keys.clone(),
            authenticator: self.authenticator.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Create a user directly in the directory.
    pub async fn user(&self, external_id: &str) -> User {
        self.users
            .create(external_id, PlaceholderProfile::for_external_id(external_id))
            .await
            .expect("create user")
    }

    pub async fn create_key(&self, owner: Uuid, permissions: &[&str]) -> CreatedApiKey {
        self.api_keys
            .create(
                owner,
                NewApiKey {
                    name: "test".to_string(),
                    permissions: permissions.iter().map(|p| p.to_string()).collect(),
                    expires_at: None,
                },
            )
            .await
            .expect("create key")
    }
}

impl Drop for TestServices {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
