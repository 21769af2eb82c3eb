//! Access-key lifecycle: issue, verify, regenerate, revoke (§4.D).

use async_trait::async_trait;
use chrono::Utc;

use crate::access_keys::crypto::{self, IssuedKey};
use crate::error::{CoreError, Result};
use crate::model::permission::PermissionSet;
use crate::model::principal::AccessKeyRecord;

/// Storage contract the registry needs from whatever adapter backs it.
/// Implemented by the storage layer's adapters, mirroring the way
/// document/vector operations are exposed through their own trait.
#[async_trait]
pub trait AccessKeyStore: Send + Sync {
    async fn insert_access_key(&self, record: AccessKeyRecord) -> Result<()>;
    async fn get_access_key_by_id(&self, id: &str) -> Result<Option<AccessKeyRecord>>;
    async fn get_access_key_by_prefix(&self, prefix: &str) -> Result<Option<AccessKeyRecord>>;
    async fn list_access_keys_for_owner(&self, owner_user_id: &str) -> Result<Vec<AccessKeyRecord>>;
    async fn update_access_key(&self, record: AccessKeyRecord) -> Result<()>;
    async fn delete_access_key(&self, id: &str) -> Result<()>;
}

/// The plaintext key, returned exactly once at creation or regeneration.
pub struct PlaintextKey {
    pub record: AccessKeyRecord,
    pub plaintext: String,
}

/// Orchestrates key issuance against a `dyn AccessKeyStore`, enforcing the
/// ownership rule that only the creating user may read/update/delete/
/// regenerate a key (§4.D: "an admin is not implicitly an owner").
pub struct AccessKeyRegistry<S: AccessKeyStore> {
    store: S,
}

impl<S: AccessKeyStore> AccessKeyRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn issue(
        &self,
        owner_user_id: &str,
        name: String,
        description: Option<String>,
        permissions: PermissionSet,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<PlaintextKey> {
        let IssuedKey {
            plaintext,
            prefix,
            hash,
        } = crypto::issue_key()?;

        let record = AccessKeyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            name,
            description,
            permissions,
            key_prefix: prefix,
            key_hash: hash,
            created_at: Utc::now(),
            expires_at,
            last_used_at: None,
            revoked: false,
        };

        self.store.insert_access_key(record.clone()).await?;
        Ok(PlaintextKey { record, plaintext })
    }

    /// Verify a presented plaintext key and return its record if valid.
    /// `last_used_at` is updated best-effort: a failure here never denies
    /// access (§4.D verification).
    pub async fn verify(&self, plaintext: &str) -> Result<Option<AccessKeyRecord>> {
        let Some(prefix) = crypto::prefix_of(plaintext) else {
            return Ok(None);
        };
        let Some(mut record) = self.store.get_access_key_by_prefix(prefix).await? else {
            return Ok(None);
        };

        if !crypto::verify_key(plaintext, &record.key_hash)? {
            return Ok(None);
        }
        if !record.is_valid(Utc::now()) {
            return Ok(None);
        }

        record.last_used_at = Some(Utc::now());
        if self.store.update_access_key(record.clone()).await.is_err() {
            tracing::warn!(key_id = %record.id, "failed to record access key last_used_at");
        }

        Ok(Some(record))
    }

    pub async fn get(&self, requester_user_id: &str, id: &str) -> Result<AccessKeyRecord> {
        let record = self.fetch_owned(requester_user_id, id).await?;
        Ok(record)
    }

    pub async fn list_for_owner(&self, owner_user_id: &str) -> Result<Vec<AccessKeyRecord>> {
        self.store.list_access_keys_for_owner(owner_user_id).await
    }

    pub async fn update(
        &self,
        requester_user_id: &str,
        id: &str,
        name: Option<String>,
        description: Option<String>,
        permissions: Option<PermissionSet>,
    ) -> Result<AccessKeyRecord> {
        let mut record = self.fetch_owned(requester_user_id, id).await?;
        if let Some(name) = name {
            record.name = name;
        }
        if let Some(description) = description {
            record.description = Some(description);
        }
        if let Some(permissions) = permissions {
            record.permissions = permissions;
        }
        self.store.update_access_key(record.clone()).await?;
        Ok(record)
    }

    pub async fn revoke(&self, requester_user_id: &str, id: &str) -> Result<()> {
        let mut record = self.fetch_owned(requester_user_id, id).await?;
        record.revoked = true;
        self.store.update_access_key(record).await
    }

    pub async fn delete(&self, requester_user_id: &str, id: &str) -> Result<()> {
        self.fetch_owned(requester_user_id, id).await?;
        self.store.delete_access_key(id).await
    }

    /// Atomic regeneration: issue a new key, persist its hash in place of
    /// the old one, and invalidate the previous plaintext immediately upon
    /// commit (§4.D regeneration).
    pub async fn regenerate(&self, requester_user_id: &str, id: &str) -> Result<PlaintextKey> {
        let mut record = self.fetch_owned(requester_user_id, id).await?;
        let IssuedKey {
            plaintext,
            prefix,
            hash,
        } = crypto::issue_key()?;
        record.key_prefix = prefix;
        record.key_hash = hash;
        self.store.update_access_key(record.clone()).await?;
        Ok(PlaintextKey { record, plaintext })
    }

    async fn fetch_owned(&self, requester_user_id: &str, id: &str) -> Result<AccessKeyRecord> {
        let record = self
            .store
            .get_access_key_by_id(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("access key '{id}'")))?;
        if record.owner_user_id != requester_user_id {
            return Err(CoreError::Forbidden(
                "only the creating user may manage this access key".to_string(),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        by_id: Mutex<HashMap<String, AccessKeyRecord>>,
    }

    #[async_trait]
    impl AccessKeyStore for MemoryStore {
        async fn insert_access_key(&self, record: AccessKeyRecord) -> Result<()> {
            self.by_id.lock().await.insert(record.id.clone(), record);
            Ok(())
        }

        async fn get_access_key_by_id(&self, id: &str) -> Result<Option<AccessKeyRecord>> {
            Ok(self.by_id.lock().await.get(id).cloned())
        }

        async fn get_access_key_by_prefix(&self, prefix: &str) -> Result<Option<AccessKeyRecord>> {
            Ok(self
                .by_id
                .lock()
                .await
                .values()
                .find(|r| r.key_prefix == prefix)
                .cloned())
        }

        async fn list_access_keys_for_owner(&self, owner_user_id: &str) -> Result<Vec<AccessKeyRecord>> {
            Ok(self
                .by_id
                .lock()
                .await
                .values()
                .filter(|r| r.owner_user_id == owner_user_id)
                .cloned()
                .collect())
        }

        async fn update_access_key(&self, record: AccessKeyRecord) -> Result<()> {
            self.by_id.lock().await.insert(record.id.clone(), record);
            Ok(())
        }

        async fn delete_access_key(&self, id: &str) -> Result<()> {
            self.by_id.lock().await.remove(id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn issued_key_verifies_and_resolves_to_its_record() {
        let registry = AccessKeyRegistry::new(MemoryStore::default());
        let issued = registry
            .issue("u1", "ci".into(), None, PermissionSet::default(), None)
            .await
            .unwrap();

        let verified = registry.verify(&issued.plaintext).await.unwrap().unwrap();
        assert_eq!(verified.id, issued.record.id);
    }

    #[tokio::test]
    async fn revoked_key_fails_verification() {
        let registry = AccessKeyRegistry::new(MemoryStore::default());
        let issued = registry
            .issue("u1", "ci".into(), None, PermissionSet::default(), None)
            .await
            .unwrap();
        registry.revoke("u1", &issued.record.id).await.unwrap();
        assert!(registry.verify(&issued.plaintext).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_owner_cannot_manage_key() {
        let registry = AccessKeyRegistry::new(MemoryStore::default());
        let issued = registry
            .issue("u1", "ci".into(), None, PermissionSet::default(), None)
            .await
            .unwrap();
        let result = registry.get("u2", &issued.record.id).await;
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }

    #[tokio::test]
    async fn regenerate_invalidates_previous_plaintext() {
        let registry = AccessKeyRegistry::new(MemoryStore::default());
        let issued = registry
            .issue("u1", "ci".into(), None, PermissionSet::default(), None)
            .await
            .unwrap();
        let regenerated = registry.regenerate("u1", &issued.record.id).await.unwrap();

        assert!(registry.verify(&issued.plaintext).await.unwrap().is_none());
        assert!(registry
            .verify(&regenerated.plaintext)
            .await
            .unwrap()
            .is_some());
    }
}
