//! Where an `AccessLog` record ultimately lands.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::model::access_log::AccessLog;
use crate::model::document::Document;
use crate::storage::StorageAdapter;

/// The name of the metadata collection access logs are appended to.
pub const ACCESS_LOGS_COLLECTION: &str = "access_logs";

/// A destination for a single `AccessLog` record. Implemented for any
/// `StorageAdapter` by writing it as a document into the `access_logs`
/// metadata collection.
#[async_trait]
pub trait AccessLogSink: Send + Sync {
    async fn append(&self, log: AccessLog) -> Result<()>;
}

#[async_trait]
impl<S: StorageAdapter + ?Sized> AccessLogSink for S {
    async fn append(&self, log: AccessLog) -> Result<()> {
        let id = log.id.clone();
        let json = serde_json::to_value(&log).map_err(|e| {
            crate::error::CoreError::Internal(format!("failed to serialize access log: {e}"))
        })?;
        let data = crate::model::value::Value::from_json(json)
            .as_object()
            .cloned()
            .unwrap_or_default();

        let document = Document {
            id,
            collection: ACCESS_LOGS_COLLECTION.to_string(),
            data,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        self.insert_one(ACCESS_LOGS_COLLECTION, document).await?;
        Ok(())
    }
}
