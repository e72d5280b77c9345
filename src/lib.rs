// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reminder Auth - Request Authentication Layer
//!
//! Establishes caller identity for the reminder service from bearer JWTs
//! (verified against the issuer's published key set) or opaque API keys
//! (verified against Argon2 hashes found by a public prefix).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Key-set cache, token verifier, API keys, identity resolution, policies
//! - `config` - Environment configuration
//! - `server` - Serving and graceful shutdown
//! - `storage` - File-backed user directory and API-key store

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod state;
pub mod storage;
