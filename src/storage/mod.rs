// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! File-backed persistence for the user directory and the API-key store.
//! Every record is a JSON document under `DATA_DIR` (default `./data`).
//!
//! ## Storage Layout
//!
//! ```text
//! ./data/
//!   users/{user_id}.json
//!   users-by-external/{sha256(external_id)}.json
//!   api-keys/{key_id}.json
//!   api-keys-by-prefix/{hex(prefix)}/{key_id}.json
//!   api-keys-by-owner/{user_id}/{key_id}.json
//! ```
//!
//! ## Important Notes
//!
//! - Plaintext API keys are never written; records only carry the Argon2 hash
//! - Index files are written after the record they point to
//! - Repositories serialize their own read-modify-write cycles

pub mod json_store;
pub mod paths;
pub mod repository;

pub use json_store::{JsonStorage, StorageError, StorageResult};
pub use paths::StoragePaths;
pub use repository::{ApiKeyRepository, UserRepository};
