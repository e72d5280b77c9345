// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind IP (IPv4 or IPv6) | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for user and API-key storage | `./data` |
//! | `AUTH_DOMAIN` | Token issuer domain (issuer is `https://{domain}/`) | `dev.auth0.com` |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | `dev-api` |
//! | `AUTH_JWKS_URL` | Overrides the derived JWKS endpoint | Derived from `AUTH_DOMAIN` |
//! | `AUTH_LEEWAY_SECS` | Clock skew tolerance for `exp`/`nbf` | `60` |
//! | `API_KEY_HASH_MEMORY_KIB` | Argon2 memory cost | `19456` |
//! | `API_KEY_HASH_ITERATIONS` | Argon2 iteration count | `2` |
//! | `TLS_CERT_PATH` | PEM certificate chain, HTTPS when set with the key | Unset (HTTP) |
//! | `TLS_KEY_PATH` | PEM private key | Unset (HTTP) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::auth::api_keys::{DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_MEMORY_KIB};
use crate::auth::verifier::DEFAULT_LEEWAY_SECS;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the storage root.
///
/// Users live under `users/`, API keys under `api_keys/`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the trusted token issuer domain.
///
/// A bare host such as `tenant.eu.auth0.com`. Tokens must carry
/// `iss = https://{domain}/` and are checked against the key set published
/// at `https://{domain}/.well-known/jwks.json`.
pub const AUTH_DOMAIN_ENV: &str = "AUTH_DOMAIN";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_LEEWAY_SECS_ENV: &str = "AUTH_LEEWAY_SECS";
pub const API_KEY_HASH_MEMORY_KIB_ENV: &str = "API_KEY_HASH_MEMORY_KIB";
pub const API_KEY_HASH_ITERATIONS_ENV: &str = "API_KEY_HASH_ITERATIONS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Development issuer. Only suitable for local runs.
pub const DEV_AUTH_DOMAIN: &str = "dev.auth0.com";
pub const DEV_AUTH_AUDIENCE: &str = "dev-api";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("{set} is set but {missing} is not")]
    Incomplete {
        set: &'static str,
        missing: &'static str,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(()),
        }
    }
}

/// Certificate and key files for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub auth_domain: String,
    pub auth_audience: String,
    pub jwks_url: Option<Url>,
    pub leeway_secs: u64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let ip = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host.clone(),
            })?;
        let port = parse_or(&var, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = SocketAddr::new(ip, port);

        let auth_domain = var(AUTH_DOMAIN_ENV).unwrap_or_else(|| {
            warn!(
                domain = DEV_AUTH_DOMAIN,
                "{AUTH_DOMAIN_ENV} not set, using development issuer"
            );
            DEV_AUTH_DOMAIN.to_string()
        });
        let auth_audience = var(AUTH_AUDIENCE_ENV).unwrap_or_else(|| {
            warn!(
                audience = DEV_AUTH_AUDIENCE,
                "{AUTH_AUDIENCE_ENV} not set, using development audience"
            );
            DEV_AUTH_AUDIENCE.to_string()
        });

        let jwks_url = var(AUTH_JWKS_URL_ENV)
            .map(|raw| {
                Url::parse(&raw).map_err(|_| ConfigError::Invalid {
                    name: AUTH_JWKS_URL_ENV,
                    value: raw,
                })
            })
            .transpose()?;

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    set: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    set: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
        };

        Ok(Self {
            bind_addr,
            data_dir: var(DATA_DIR_ENV)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
                .into(),
            auth_domain,
            auth_audience,
            jwks_url,
            leeway_secs: parse_or(&var, AUTH_LEEWAY_SECS_ENV, DEFAULT_LEEWAY_SECS)?,
            hash_memory_kib: parse_or(&var, API_KEY_HASH_MEMORY_KIB_ENV, DEFAULT_HASH_MEMORY_KIB)?,
            hash_iterations: parse_or(&var, API_KEY_HASH_ITERATIONS_ENV, DEFAULT_HASH_ITERATIONS)?,
            tls,
            log_format: parse_or(&var, LOG_FORMAT_ENV, LogFormat::default())?,
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
