//! Storage-backed `AccessKeyStore` (§4.D), persisting `AccessKeyRecord`s as
//! documents in the `access_keys` metadata collection the same way
//! `collections::metadata` persists `Collection`/`View`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::access_keys::registry::AccessKeyStore;
use crate::collections::metadata;
use crate::error::Result;
use crate::model::principal::AccessKeyRecord;
use crate::storage::StorageAdapter;

pub const ACCESS_KEYS_META: &str = "access_keys";

/// `AccessKeyStore` over any `StorageAdapter`. Lookups by prefix scan the
/// (small) access-key collection rather than maintaining a secondary index
/// — key issuance is an admin-rate operation, not a hot path.
pub struct StorageAccessKeyStore {
    storage: Arc<dyn StorageAdapter>,
}

impl StorageAccessKeyStore {
    pub async fn new(storage: Arc<dyn StorageAdapter>) -> Result<Self> {
        match storage.create_collection(ACCESS_KEYS_META).await {
            Ok(()) => {}
            Err(crate::error::CoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(Self { storage })
    }
}

#[async_trait]
impl AccessKeyStore for StorageAccessKeyStore {
    async fn insert_access_key(&self, record: AccessKeyRecord) -> Result<()> {
        metadata::put(self.storage.as_ref(), ACCESS_KEYS_META, &record.id, &record).await
    }

    async fn get_access_key_by_id(&self, id: &str) -> Result<Option<AccessKeyRecord>> {
        metadata::get(self.storage.as_ref(), ACCESS_KEYS_META, id).await
    }

    async fn get_access_key_by_prefix(&self, prefix: &str) -> Result<Option<AccessKeyRecord>> {
        let all: Vec<AccessKeyRecord> = metadata::list(self.storage.as_ref(), ACCESS_KEYS_META).await?;
        Ok(all.into_iter().find(|r| r.key_prefix == prefix))
    }

    async fn list_access_keys_for_owner(&self, owner_user_id: &str) -> Result<Vec<AccessKeyRecord>> {
        let all: Vec<AccessKeyRecord> = metadata::list(self.storage.as_ref(), ACCESS_KEYS_META).await?;
        Ok(all.into_iter().filter(|r| r.owner_user_id == owner_user_id).collect())
    }

    async fn update_access_key(&self, record: AccessKeyRecord) -> Result<()> {
        metadata::put(self.storage.as_ref(), ACCESS_KEYS_META, &record.id, &record).await
    }

    async fn delete_access_key(&self, id: &str) -> Result<()> {
        metadata::remove(self.storage.as_ref(), ACCESS_KEYS_META, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::permission::PermissionSet;
    use crate::storage::MemoryAdapter;
    use chrono::Utc;

    fn record(id: &str, owner: &str, prefix: &str) -> AccessKeyRecord {
        AccessKeyRecord {
            id: id.into(),
            owner_user_id: owner.into(),
            name: "ci".into(),
            description: None,
            permissions: PermissionSet::default(),
            key_prefix: prefix.into(),
            key_hash: "h".into(),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            revoked: false,
        }
    }

    async fn store() -> StorageAccessKeyStore {
        let adapter: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new().await.unwrap());
        StorageAccessKeyStore::new(adapter).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_by_id_and_prefix() {
        let store = store().await;
        store.insert_access_key(record("k1", "u1", "ab_123")).await.unwrap();

        assert_eq!(store.get_access_key_by_id("k1").await.unwrap().unwrap().id, "k1");
        assert_eq!(store.get_access_key_by_prefix("ab_123").await.unwrap().unwrap().id, "k1");
        assert!(store.get_access_key_by_prefix("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_only_keys_for_owner() {
        let store = store().await;
        store.insert_access_key(record("k1", "u1", "ab_1")).await.unwrap();
        store.insert_access_key(record("k2", "u2", "ab_2")).await.unwrap();

        let keys = store.list_access_keys_for_owner("u1").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].id, "k1");
    }

    #[tokio::test]
    async fn delete_removes_the_record() {
        let store = store().await;
        store.insert_access_key(record("k1", "u1", "ab_1")).await.unwrap();
        store.delete_access_key("k1").await.unwrap();
        assert!(store.get_access_key_by_id("k1").await.unwrap().is_none());
    }
}
