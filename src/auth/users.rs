//! User persistence (§6 "Persisted layout" — the `users` metadata
//! collection), the counterpart to `collections::metadata` for `User`
//! records and the source of RBAC's per-user `extra_grants`.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::collections::metadata;
use crate::error::{CoreError, Result};
use crate::model::permission::PermissionSet;
use crate::model::principal::{Role, User};
use crate::storage::StorageAdapter;

pub const USERS_META: &str = "users";

/// CRUD plus login-attempt bookkeeping for `User` records, backed by any
/// `StorageAdapter` through the metadata-as-documents pattern.
pub struct UserStore {
    storage: Arc<dyn StorageAdapter>,
}

impl UserStore {
    pub async fn new(storage: Arc<dyn StorageAdapter>) -> Result<Self> {
        match storage.create_collection(USERS_META).await {
            Ok(()) => {}
            Err(CoreError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(Self { storage })
    }

    pub async fn create(&self, email: &str, password_hash: String, name: String, role: Role) -> Result<User> {
        if self.get_by_email(email).await?.is_some() {
            return Err(CoreError::Conflict(format!("user with email '{email}' already exists")));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            name,
            role,
            active: true,
            failed_login_attempts: 0,
            locked_until: None,
            extra_grants: PermissionSet::default(),
            created_at: now,
            updated_at: now,
        };
        metadata::put(self.storage.as_ref(), USERS_META, &user.id, &user).await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        metadata::get(self.storage.as_ref(), USERS_META, id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let all: Vec<User> = metadata::list(self.storage.as_ref(), USERS_META).await?;
        Ok(all.into_iter().find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        metadata::list(self.storage.as_ref(), USERS_META).await
    }

    pub async fn update(&self, user: User) -> Result<User> {
        let mut user = user;
        user.updated_at = Utc::now();
        metadata::put(self.storage.as_ref(), USERS_META, &user.id, &user).await?;
        Ok(user)
    }

    /// Records a failed login attempt and locks the account once the
    /// threshold is hit (§7 rate-limit policy).
    pub async fn record_failed_login(&self, user: &mut User, max_attempts: u32, lockout: chrono::Duration) {
        user.failed_login_attempts += 1;
        if user.failed_login_attempts >= max_attempts {
            user.locked_until = Some(Utc::now() + lockout);
        }
        if let Err(e) = self.update(user.clone()).await {
            tracing::warn!(user_id = %user.id, error = %e, "failed to persist failed-login bookkeeping");
        }
    }

    pub async fn record_successful_login(&self, user: &mut User) {
        user.failed_login_attempts = 0;
        user.locked_until = None;
        if let Err(e) = self.update(user.clone()).await {
            tracing::warn!(user_id = %user.id, error = %e, "failed to persist successful-login bookkeeping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAdapter;

    async fn store() -> UserStore {
        let adapter: Arc<dyn StorageAdapter> = Arc::new(MemoryAdapter::new().await.unwrap());
        UserStore::new(adapter).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_lookup_by_email_and_id() {
        let store = store().await;
        let user = store.create("a@x.io", "hash".into(), "A".into(), Role::Regular).await.unwrap();

        assert_eq!(store.get_by_id(&user.id).await.unwrap().unwrap().email, "a@x.io");
        assert_eq!(store.get_by_email("A@X.IO").await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = store().await;
        store.create("a@x.io", "hash".into(), "A".into(), Role::Regular).await.unwrap();
        let err = store.create("a@x.io", "hash2".into(), "A2".into(), Role::Regular).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn repeated_failed_logins_lock_the_account() {
        let store = store().await;
        let mut user = store.create("a@x.io", "hash".into(), "A".into(), Role::Regular).await.unwrap();

        for _ in 0..3 {
            store.record_failed_login(&mut user, 3, chrono::Duration::minutes(15)).await;
        }
        assert!(user.is_locked(Utc::now()));

        store.record_successful_login(&mut user).await;
        assert!(!user.is_locked(Utc::now()));
        assert_eq!(user.failed_login_attempts, 0);
    }
}
