//! Immutable audit trail of authorization decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of an authorization decision (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessResult {
    Allowed,
    Denied,
}

/// A single append-only audit record (§3). Never mutated after creation;
/// never returned from a listing endpoint unless explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: String,
    pub principal_id: String,
    pub resource: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub action: String,
    pub result: AccessResult,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl AccessLog {
    pub fn allowed(
        principal_id: impl Into<String>,
        resource: impl Into<String>,
        resource_id: Option<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: principal_id.into(),
            resource: resource.into(),
            resource_id,
            action: action.into(),
            result: AccessResult::Allowed,
            reason: "allowed".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn denied(
        principal_id: impl Into<String>,
        resource: impl Into<String>,
        resource_id: Option<String>,
        action: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id: principal_id.into(),
            resource: resource.into(),
            resource_id,
            action: action.into(),
            result: AccessResult::Denied,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_record_carries_no_deny_reason() {
        let log = AccessLog::allowed("u1", "collection", Some("products".into()), "read");
        assert_eq!(log.result, AccessResult::Allowed);
    }

    #[test]
    fn denied_record_preserves_given_reason() {
        let log = AccessLog::denied(
            "u1",
            "collection",
            Some("products".into()),
            "delete",
            "insufficient permissions",
        );
        assert_eq!(log.result, AccessResult::Denied);
        assert_eq!(log.reason, "insufficient permissions");
    }
}
