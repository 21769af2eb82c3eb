//! Principal polymorphism (§9 design note): `User` and `AccessKey` collapse
//! into a single `Principal` sum type carrying its already-expanded
//! permission set, so the RBAC evaluator (`crate::rbac`) never branches on
//! which variant it's holding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::permission::PermissionSet;

/// A user's role, used to compute their default permission set (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Regular,
}

/// A registered user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Never serialized onto the wire by a handler — `User` itself is also
    /// the metadata-document representation persisted via
    /// `collections::metadata`, which round-trips every field, so the
    /// redaction for API responses happens in `api::handlers`, not here.
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Per-user grants layered on top of the role's default permission set
    /// (§4.C). Empty for almost every account; populated by an admin to
    /// hand a `Regular` user narrow access without promoting their role.
    #[serde(default)]
    pub extra_grants: PermissionSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Is this user currently locked out of login (§7 rate-limit policy)?
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// JWT claims embedded in access tokens, extended with the role so the
/// RBAC evaluator doesn't need a database round trip to expand a User
/// principal's permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id).
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp).
    pub exp: usize,
    /// Issued at time (Unix timestamp).
    pub iat: usize,
}

/// A long-lived API key record, as stored (never holds the plaintext key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKeyRecord {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
    /// Short cleartext prefix for log/display purposes only — see §4.D.
    pub key_prefix: String,
    /// Redacted by `api::handlers` before a record reaches the wire, same
    /// as `User::password_hash`.
    pub key_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl AccessKeyRecord {
    /// Is this key currently usable?
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.is_none_or(|exp| now < exp)
    }
}

/// The resolved identity of a caller. Exactly one per operation (§3).
#[derive(Debug, Clone)]
pub enum Principal {
    User(Box<User>),
    AccessKey(Box<AccessKeyRecord>),
}

impl Principal {
    /// A stable id suitable for audit-log correlation, regardless of
    /// variant.
    pub fn id(&self) -> &str {
        match self {
            Principal::User(u) => &u.id,
            Principal::AccessKey(k) => &k.id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::User(u) if u.role == Role::Admin)
    }

    /// The user id that owns this principal's actions, for ownership checks
    /// in the access-key registry (§4.D — only the creating user may
    /// manage their own keys; an admin is not implicitly an owner).
    pub fn owner_user_id(&self) -> &str {
        match self {
            Principal::User(u) => &u.id,
            Principal::AccessKey(k) => &k.owner_user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: Role) -> User {
        User {
            id: "u1".into(),
            email: "a@x.io".into(),
            password_hash: "hash".into(),
            name: "A".into(),
            role,
            active: true,
            failed_login_attempts: 0,
            locked_until: None,
            extra_grants: PermissionSet::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_principal_reports_is_admin() {
        let p = Principal::User(Box::new(sample_user(Role::Admin)));
        assert!(p.is_admin());
    }

    #[test]
    fn access_key_never_reports_is_admin() {
        let key = AccessKeyRecord {
            id: "k1".into(),
            owner_user_id: "u1".into(),
            name: "ci".into(),
            description: None,
            permissions: PermissionSet::default(),
            key_prefix: "ab_abc123".into(),
            key_hash: "hash".into(),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            revoked: false,
        };
        let p = Principal::AccessKey(Box::new(key));
        assert!(!p.is_admin());
        assert_eq!(p.owner_user_id(), "u1");
    }

    #[test]
    fn locked_user_checked_against_clock() {
        let mut user = sample_user(Role::Regular);
        user.locked_until = Some(Utc::now() + chrono::Duration::minutes(5));
        assert!(user.is_locked(Utc::now()));
        assert!(!user.is_locked(Utc::now() + chrono::Duration::minutes(10)));
    }
}
