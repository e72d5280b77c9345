// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout for the file-backed user directory and API-key store.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Default base directory for persistent storage.
pub const DATA_ROOT: &str = "./data";

/// Storage path utilities.
///
/// Every path component derived from caller-controlled input (external
/// identities, API-key prefixes) is hex-encoded or hashed so that it can
/// never escape its directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== User Paths ==========

    /// Directory containing all user records.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// Path to a user record.
    pub fn user(&self, user_id: &Uuid) -> PathBuf {
        self.users_dir().join(format!("{user_id}.json"))
    }

    /// Directory of the external-identity → user id index.
    pub fn external_index_dir(&self) -> PathBuf {
        self.root.join("users-by-external")
    }

    /// Index entry for an external identity (SHA-256 of the identity).
    pub fn external_index(&self, external_id: &str) -> PathBuf {
        let digest = Sha256::digest(external_id.as_bytes());
        self.external_index_dir()
            .join(format!("{}.json", hex::encode(digest)))
    }

    // ========== API Key Paths ==========

    /// Directory containing all API-key records.
    pub fn api_keys_dir(&self) -> PathBuf {
        self.root.join("api-keys")
    }

    /// Path to an API-key record.
    pub fn api_key(&self, key_id: &Uuid) -> PathBuf {
        self.api_keys_dir().join(format!("{key_id}.json"))
    }

    /// Directory of the prefix index.
    pub fn prefix_index_dir(&self) -> PathBuf {
        self.root.join("api-keys-by-prefix")
    }

    /// Shard holding one marker file per key sharing `prefix`.
    pub fn prefix_shard(&self, prefix: &str) -> PathBuf {
        self.prefix_index_dir().join(hex::encode(prefix.as_bytes()))
    }

    /// Marker file for a key inside its prefix shard.
    pub fn prefix_entry(&self, prefix: &str, key_id: &Uuid) -> PathBuf {
        self.prefix_shard(prefix).join(format!("{key_id}.json"))
    }

    /// Directory of the owner index.
    pub fn owner_index_dir(&self) -> PathBuf {
        self.root.join("api-keys-by-owner")
    }

    /// Shard holding one marker file per key owned by `owner`.
    pub fn owner_shard(&self, owner: &Uuid) -> PathBuf {
        self.owner_index_dir().join(owner.to_string())
    }

    /// Marker file for a key inside its owner shard.
    pub fn owner_entry(&self, owner: &Uuid, key_id: &Uuid) -> PathBuf {
        self.owner_shard(owner).join(format!("{key_id}.json"))
    }
}
