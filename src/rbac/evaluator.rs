//! The RBAC evaluator itself: a pure function from `(principal, resource,
//! name, action)` to an allow/deny decision, plus a request-scoped cache so
//! a single request can call it repeatedly without recomputing the
//! principal's expanded permission set (§4.C resolution steps 1-5).

use std::sync::OnceLock;

use crate::model::permission::{Action, PermissionSet, PermissionString, ResourceKind};
use crate::model::principal::{Principal, Role};

/// The default permission set granted to a user by their role alone,
/// before any per-user grants are layered on (§4.C step 2).
fn role_default_permissions(role: Role) -> PermissionSet {
    match role {
        Role::Admin => PermissionSet::new(vec!["*:*:*".parse().unwrap()]),
        Role::Developer => PermissionSet::new(vec![
            "collection:*:read".parse().unwrap(),
            "collection:*:write".parse().unwrap(),
        ]),
        Role::Regular => PermissionSet::default(),
    }
}

/// Compute a principal's effective permission set (§4.C steps 1-3).
/// `extra_grants` are per-user grants recorded outside the role mapping;
/// ignored for AccessKey principals, whose permission set is their stored
/// list verbatim.
pub fn effective_permissions(principal: &Principal, extra_grants: &PermissionSet) -> PermissionSet {
    match principal {
        Principal::User(user) => {
            role_default_permissions(user.role).merge(extra_grants.clone())
        }
        Principal::AccessKey(key) => key.permissions.clone(),
    }
}

/// Pure decision function: does `principal`'s effective permission set
/// grant `(resource_kind, name, action)`? Admins short-circuit to true
/// without consulting their (trivial) permission set, matching step 1.
pub fn allowed(
    principal: &Principal,
    extra_grants: &PermissionSet,
    resource_kind: ResourceKind,
    name: &str,
    action: Action,
) -> bool {
    if principal.is_admin() {
        return true;
    }
    effective_permissions(principal, extra_grants).allows(resource_kind, name, action)
}

/// A per-request cache over a single principal's expanded permission set.
/// Built once per incoming request and dropped at its end — never shared
/// across requests, so a permission change takes effect on the very next
/// request without any invalidation logic.
pub struct RbacEvaluator {
    principal: Principal,
    cache: OnceLock<PermissionSet>,
}

impl RbacEvaluator {
    pub fn new(principal: Principal, extra_grants: PermissionSet) -> Self {
        let evaluator = Self {
            principal,
            cache: OnceLock::new(),
        };
        let _ = evaluator.cache.set(extra_grants);
        evaluator
    }

    fn expanded(&self) -> PermissionSet {
        let extra = self.cache.get().cloned().unwrap_or_default();
        effective_permissions(&self.principal, &extra)
    }

    pub fn allowed(&self, resource_kind: ResourceKind, name: &str, action: Action) -> bool {
        if self.principal.is_admin() {
            return true;
        }
        self.expanded().allows(resource_kind, name, action)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Convenience for constructing a one-off explicit grant, e.g. when
/// recording a per-user grant outside the role mapping.
pub fn grant(resource: ResourceKind, name: &str, action: Action) -> PermissionString {
    PermissionString::new(
        resource,
        if name == "*" {
            crate::model::permission::NamePattern::Any
        } else {
            crate::model::permission::NamePattern::Literal(name.to_string())
        },
        action,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::principal::{AccessKeyRecord, User};

    fn user(role: Role) -> Principal {
        Principal::User(Box::new(User {
            id: "u1".into(),
            email: "a@x.io".into(),
            password_hash: "h".into(),
            name: "A".into(),
            role,
            active: true,
            failed_login_attempts: 0,
            locked_until: None,
            extra_grants: PermissionSet::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }))
    }

    #[test]
    fn admin_is_always_allowed() {
        let p = user(Role::Admin);
        assert!(allowed(
            &p,
            &PermissionSet::default(),
            ResourceKind::Collection,
            "anything",
            Action::Delete
        ));
    }

    #[test]
    fn developer_default_set_allows_read_and_write_everywhere() {
        let p = user(Role::Developer);
        let extra = PermissionSet::default();
        assert!(allowed(&p, &extra, ResourceKind::Collection, "x", Action::Read));
        assert!(allowed(&p, &extra, ResourceKind::Collection, "x", Action::Write));
        assert!(!allowed(&p, &extra, ResourceKind::Collection, "x", Action::Delete));
    }

    #[test]
    fn regular_user_has_no_default_access() {
        let p = user(Role::Regular);
        assert!(!allowed(
            &p,
            &PermissionSet::default(),
            ResourceKind::Collection,
            "x",
            Action::Read
        ));
    }

    #[test]
    fn per_user_grant_extends_regular_users_access() {
        let p = user(Role::Regular);
        let extra = PermissionSet::new(vec![grant(ResourceKind::Collection, "products", Action::Read)]);
        assert!(allowed(&p, &extra, ResourceKind::Collection, "products", Action::Read));
        assert!(!allowed(&p, &extra, ResourceKind::Collection, "other", Action::Read));
    }

    #[test]
    fn access_key_ignores_extra_grants_and_role_mapping() {
        let key = Principal::AccessKey(Box::new(AccessKeyRecord {
            id: "k1".into(),
            owner_user_id: "u1".into(),
            name: "ci".into(),
            description: None,
            permissions: PermissionSet::new(vec!["collection:products:read".parse().unwrap()]),
            key_prefix: "ab_abc".into(),
            key_hash: "h".into(),
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
            revoked: false,
        }));
        let extra = PermissionSet::new(vec!["collection:*:write".parse().unwrap()]);
        assert!(allowed(&key, &extra, ResourceKind::Collection, "products", Action::Read));
        assert!(!allowed(&key, &extra, ResourceKind::Collection, "products", Action::Write));
    }

    #[test]
    fn evaluator_is_pure_across_repeated_calls() {
        let p = user(Role::Developer);
        let evaluator = RbacEvaluator::new(p, PermissionSet::default());
        let first = evaluator.allowed(ResourceKind::Collection, "x", Action::Read);
        let second = evaluator.allowed(ResourceKind::Collection, "x", Action::Read);
        assert_eq!(first, second);
    }
}
