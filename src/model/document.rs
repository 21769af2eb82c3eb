//! Documents: the per-record payload stored inside a collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::value::DocumentData;

/// A single record in a collection (§3). `data` holds the schema-validated
/// fields; everything else is bookkeeping the storage adapter owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: String,
    pub data: DocumentData,
    /// Monotonically increasing per-document counter, bumped on every
    /// accepted write. Used for optimistic-concurrency checks and, when
    /// `CollectionSettings::versioning` is on, to key historical copies.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone (§4.A): present iff the document is deleted
    /// and `CollectionSettings::soft_delete` is enabled for its collection.
    /// A filter of `null` on this field is how queries exclude tombstones.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// How `UpdateDocument` should combine the incoming payload with the
/// existing record (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Incoming data wholly replaces the existing `data` map.
    #[default]
    Replace,
    /// Incoming fields are merged into the existing `data` map, one level
    /// deep; a `null` value for a key removes that key.
    Patch,
}

/// Optimistic-concurrency precondition for `UpdateDocument`/`DeleteDocument`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct VersionPrecondition {
    /// When set, the write is rejected with a conflict unless the stored
    /// document's current `version` equals this value.
    pub if_version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Document {
        Document {
            id: "d1".into(),
            collection: "products".into(),
            data: BTreeMap::new(),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn fresh_document_is_not_deleted() {
        assert!(!sample().is_deleted());
    }

    #[test]
    fn tombstoned_document_reports_deleted() {
        let mut doc = sample();
        doc.deleted_at = Some(Utc::now());
        assert!(doc.is_deleted());
    }

    #[test]
    fn update_mode_defaults_to_replace() {
        assert_eq!(UpdateMode::default(), UpdateMode::Replace);
    }
}
