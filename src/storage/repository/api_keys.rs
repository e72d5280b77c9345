// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API-key repository: the file-backed [`ApiKeyStore`].
//!
//! ## Layout
//!
//! ```text
//! api-keys/{key_id}.json                          # full record (with hash)
//! api-keys-by-prefix/{hex(prefix)}/{key_id}.json  # prefix index
//! api-keys-by-owner/{user_id}/{key_id}.json       # owner index
//! ```
//!
//! The prefix index turns validation into a read of one small shard instead
//! of a scan over every key.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::ApiKeyStore;
use crate::models::ApiKeyRecord;

use super::super::{JsonStorage, StorageError, StorageResult};

/// Marker stored in the prefix and owner indexes.
#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key_id: Uuid,
}

/// Repository for API-key records.
pub struct ApiKeyRepository {
    storage: Arc<JsonStorage>,
    /// Serializes read-modify-write cycles so a revoke is never undone by a
    /// concurrent last-used stamp.
    write_lock: Mutex<()>,
}

impl ApiKeyRepository {
    /// Create a new ApiKeyRepository.
    pub fn new(storage: Arc<JsonStorage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn get(&self, key_id: &Uuid) -> StorageResult<Option<ApiKeyRecord>> {
        self.storage.read_json_opt(self.storage.paths().api_key(key_id))
    }

    /// Records referenced by an index shard. Dangling entries are skipped.
    fn records_in(&self, shard: &Path) -> StorageResult<Vec<ApiKeyRecord>> {
        let mut records = Vec::new();
        for stem in self.storage.list_files(shard, "json")? {
            let Ok(key_id) = Uuid::parse_str(&stem) else {
                continue;
            };
            if let Some(record) = self.get(&key_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
    async fn insert(&self, record: &ApiKeyRecord) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        let paths = self.storage.paths();

        if self.storage.exists(paths.api_key(&record.id)) {
            return Err(StorageError::AlreadyExists(format!("API key {}", record.id)));
        }

        let entry = IndexEntry { key_id: record.id };
        self.storage.write_json(paths.api_key(&record.id), record)?;
        self.storage
            .write_json(paths.prefix_entry(&record.key_prefix, &record.id), &entry)?;
        self.storage
            .write_json(paths.owner_entry(&record.user_id, &record.id), &entry)?;
        Ok(())
    }

    async fn find_active_by_prefix(
        &self,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Vec<ApiKeyRecord>> {
        let shard = self.storage.paths().prefix_shard(prefix);
        Ok(self
            .records_in(&shard)?
            .into_iter()
            .filter(|record| record.key_prefix == prefix && record.is_usable_at(now))
            .collect())
    }

    async fn list_for_owner(&self, owner: Uuid) -> StorageResult<Vec<ApiKeyRecord>> {
        let shard = self.storage.paths().owner_shard(&owner);
        let mut records: Vec<ApiKeyRecord> = self
            .records_in(&shard)?
            .into_iter()
            .filter(|record| record.user_id == owner)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn deactivate(&self, owner: Uuid, key_id: Uuid) -> StorageResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut record = match self.get(&key_id)? {
            Some(record) if record.user_id == owner => record,
            _ => return Ok(false),
        };

        if record.is_active {
            record.is_active = false;
            record.updated_at = Utc::now();
            self.storage
                .write_json(self.storage.paths().api_key(&key_id), &record)?;
        }
        Ok(true)
    }

    async fn touch_last_used(&self, key_id: Uuid, at: DateTime<Utc>) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut record = self
            .get(&key_id)?
            .ok_or_else(|| StorageError::NotFound(format!("API key {key_id}")))?;
        if record.last_used_at.is_some_and(|current| current >= at) {
            return Ok(());
        }
        record.last_used_at = Some(at);

        self.storage
            .write_json(self.storage.paths().api_key(&key_id), &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_repo() -> (ApiKeyRepository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut storage = JsonStorage::new(StoragePaths::new(temp_dir.path()));
        storage.initialize().expect("Failed to initialize");
        (ApiKeyRepository::new(Arc::new(storage)), temp_dir)
    }

    fn test_record(owner: Uuid, prefix: &str) -> ApiKeyRecord {
        let now = Utc::now();
        ApiKeyRecord {
            id: Uuid::new_v4(),
            user_id: owner,
            name: "test key".to_string(),
            key_hash: "$argon2id$placeholder".to_string(),
            key_prefix: prefix.to_string(),
            permissions: vec!["read".to_string()],
            expires_at: None,
            last_used_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn prefix_lookup_returns_all_candidates() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();

        let a = test_record(owner, "sk_aaaaa");
        let b = test_record(owner, "sk_aaaaa");
        let other = test_record(owner, "sk_bbbbb");
        for record in [&a, &b, &other] {
            repo.insert(record).await.unwrap();
        }

        let mut found: Vec<Uuid> = repo
            .find_active_by_prefix("sk_aaaaa", Utc::now())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        found.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn prefix_lookup_skips_inactive_and_expired() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();

        let active = test_record(owner, "sk_ccccc");
        let mut expired = test_record(owner, "sk_ccccc");
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));
        let revoked = test_record(owner, "sk_ccccc");
        for record in [&active, &expired, &revoked] {
            repo.insert(record).await.unwrap();
        }
        assert!(repo.deactivate(owner, revoked.id).await.unwrap());

        let found = repo
            .find_active_by_prefix("sk_ccccc", Utc::now())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, active.id);
    }

    #[tokio::test]
    async fn unknown_prefix_has_no_candidates() {
        let (repo, _dir) = test_repo();
        let found = repo
            .find_active_by_prefix("../../..", Utc::now())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let (repo, _dir) = test_repo();
        let record = test_record(Uuid::new_v4(), "sk_ddddd");
        repo.insert(&record).await.unwrap();
        assert!(matches!(
            repo.insert(&record).await,
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn list_for_owner_is_newest_first() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();

        let mut older = test_record(owner, "sk_eeeee");
        older.created_at = Utc::now() - Duration::days(1);
        let newer = test_record(owner, "sk_fffff");
        let foreign = test_record(Uuid::new_v4(), "sk_ggggg");
        for record in [&older, &newer, &foreign] {
            repo.insert(record).await.unwrap();
        }

        let listed: Vec<Uuid> = repo
            .list_for_owner(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(listed, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn deactivate_requires_ownership() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();
        let record = test_record(owner, "sk_hhhhh");
        repo.insert(&record).await.unwrap();

        assert!(!repo.deactivate(Uuid::new_v4(), record.id).await.unwrap());
        assert!(!repo.deactivate(owner, Uuid::new_v4()).await.unwrap());
        assert!(repo.deactivate(owner, record.id).await.unwrap());

        let listed = repo.list_for_owner(owner).await.unwrap();
        assert!(!listed[0].is_active);
    }

    #[tokio::test]
    async fn touch_last_used_only_moves_forward() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();
        let record = test_record(owner, "sk_iiiii");
        repo.insert(&record).await.unwrap();

        let first = Utc::now();
        repo.touch_last_used(record.id, first).await.unwrap();
        repo.touch_last_used(record.id, first - Duration::seconds(5))
            .await
            .unwrap();

        let listed = repo.list_for_owner(owner).await.unwrap();
        assert_eq!(listed[0].last_used_at, Some(first));
    }

    #[tokio::test]
    async fn touch_does_not_reactivate_revoked_key() {
        let (repo, _dir) = test_repo();
        let owner = Uuid::new_v4();
        let record = test_record(owner, "sk_jjjjj");
        repo.insert(&record).await.unwrap();

        repo.deactivate(owner, record.id).await.unwrap();
        repo.touch_last_used(record.id, Utc::now()).await.unwrap();

        let listed = repo.list_for_owner(owner).await.unwrap();
        assert!(!listed[0].is_active);
        assert!(listed[0].last_used_at.is_some());
    }
}
