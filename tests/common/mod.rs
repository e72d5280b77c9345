// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Harness for end-to-end tests: the full router over temporary storage,
//! with an in-process issuer whose RSA key set is served by a static source.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use reminder_auth::api::router;
use reminder_auth::auth::StaticKeySetSource;
use reminder_auth::config::AppConfig;
use reminder_auth::state::AppState;

pub const DOMAIN: &str = "tenant.example.com";
pub const AUDIENCE: &str = "https://api.reminders.test";
pub const KID: &str = "issuer-key-1";

struct IssuerKey {
    pem: String,
    n: String,
    e: String,
}

fn issuer_key() -> &'static IssuerKey {
    static KEY: OnceLock<IssuerKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("RSA keygen");
        IssuerKey {
            pem: private
                .to_pkcs1_pem(LineEnding::LF)
                .expect("PKCS#1 PEM")
                .to_string(),
            n: URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
        }
    })
}

pub fn issuer_jwks() -> JwkSet {
    let key = issuer_key();
    serde_json::from_value(json!({
        "keys": [{
            "kty": "RSA",
            "kid": KID,
            "use": "sig",
            "alg": "RS256",
            "n": key.n,
            "e": key.e,
        }]
    }))
    .expect("valid JWKS")
}

/// Claims accepted for `sub`.
pub fn claims(sub: &str) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": sub,
        "iss": format!("https://{DOMAIN}/"),
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
    })
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let key = EncodingKey::from_rsa_pem(issuer_key().pem.as_bytes()).expect("RSA PEM");
    encode(&header, claims, &key).expect("token encoding")
}

pub fn token(sub: &str) -> String {
    sign(&claims(sub))
}

/// HS256 token keyed with the issuer's public modulus.
pub fn hs256_token(sub: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(KID.to_string());
    let key = EncodingKey::from_secret(issuer_key().n.as_bytes());
    encode(&header, &claims(sub), &key).expect("token encoding")
}

/// Configuration for the test issuer with cheap hashing, storing under `data_dir`.
pub fn test_config(data_dir: &Path) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("HOST", "127.0.0.1".to_string()),
        ("PORT", "0".to_string()),
        ("DATA_DIR", data_dir.display().to_string()),
        ("AUTH_DOMAIN", DOMAIN.to_string()),
        ("AUTH_AUDIENCE", AUDIENCE.to_string()),
        ("API_KEY_HASH_MEMORY_KIB", "64".to_string()),
        ("API_KEY_HASH_ITERATIONS", "1".to_string()),
    ]);
    AppConfig::from_lookup(|name| vars.get(name).cloned()).expect("config")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub key_source: Arc<StaticKeySetSource>,
    shutdown: CancellationToken,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = test_config(dir.path());

        let key_source = Arc::new(StaticKeySetSource::new(issuer_jwks()));
        let shutdown = CancellationToken::new();
        let (state, _worker) =
            AppState::new(&config, key_source.clone(), shutdown.clone()).expect("app state");

        Self {
            router: router(state.clone()),
            state,
            key_source,
            shutdown,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        self.send(build(Method::GET, uri, headers, None)).await
    }

    pub async fn post(&self, uri: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
        self.send(build(Method::POST, uri, headers, Some(body))).await
    }

    pub async fn put(&self, uri: &str, headers: &[(&str, &str)], body: Value) -> (StatusCode, Value) {
        self.send(build(Method::PUT, uri, headers, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, headers: &[(&str, &str)]) -> (StatusCode, Value) {
        self.send(build(Method::DELETE, uri, headers, None)).await
    }

    /// Create an API key for the holder of `bearer` and return its plaintext.
    pub async fn issue_key(&self, bearer: &str, permissions: &[&str]) -> (String, String) {
        let auth = format!("Bearer {bearer}");
        let (status, body) = self
            .post(
                "/v1/api-keys",
                &[("authorization", auth.as_str())],
                json!({ "name": "integration", "permissions": permissions }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let key = body["key"].as_str().expect("plaintext key").to_string();
        let id = body["api_key"]["id"].as_str().expect("key id").to_string();
        (key, id)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn build(method: Method, uri: &str, headers: &[(&str, &str)], body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Poll `check` for up to two seconds.
pub async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
