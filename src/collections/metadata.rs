//! Collection and view metadata are themselves stored as documents in
//! reserved collections, the same way `crate::audit` persists access logs —
//! one storage seam for everything the core needs to remember.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CoreError, Result};
use crate::model::document::{Document, UpdateMode};
use crate::model::value::Value;
use crate::storage::StorageAdapter;

pub const COLLECTIONS_META: &str = "__collections";
pub const VIEWS_META: &str = "__views";

/// Serialize `model` into a fresh metadata document keyed by `id`.
pub fn to_document(id: &str, model: &impl Serialize) -> Result<Document> {
    let json = serde_json::to_value(model)
        .map_err(|e| CoreError::Internal(format!("failed to serialize metadata: {e}")))?;
    let data = Value::from_json(json).as_object().cloned().unwrap_or_default();
    Ok(Document {
        id: id.to_string(),
        collection: String::new(),
        data,
        version: 1,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        deleted_at: None,
    })
}

pub fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    let json = Value::Object(doc.data.clone()).into_json();
    serde_json::from_value(json)
        .map_err(|e| CoreError::Internal(format!("failed to deserialize metadata: {e}")))
}

pub async fn get<T: DeserializeOwned>(
    storage: &dyn StorageAdapter,
    meta_collection: &str,
    id: &str,
) -> Result<Option<T>> {
    match storage.find_one_by_id(meta_collection, id).await? {
        Some(doc) => Ok(Some(from_document(&doc)?)),
        None => Ok(None),
    }
}

pub async fn list<T: DeserializeOwned>(storage: &dyn StorageAdapter, meta_collection: &str) -> Result<Vec<T>> {
    let docs = storage.find(meta_collection, &BTreeMap::new(), &Default::default()).await?;
    docs.iter().map(from_document).collect()
}

pub async fn put(storage: &dyn StorageAdapter, meta_collection: &str, id: &str, model: &impl Serialize) -> Result<()> {
    let doc = to_document(id, model)?;
    match storage.find_one_by_id(meta_collection, id).await? {
        Some(_) => {
            storage
                .update_one(meta_collection, id, doc.data, UpdateMode::Replace, None)
                .await?;
        }
        None => {
            storage.insert_one(meta_collection, doc).await?;
        }
    }
    Ok(())
}

pub async fn remove(storage: &dyn StorageAdapter, meta_collection: &str, id: &str) -> Result<()> {
    storage.delete_one(meta_collection, id, true).await
}
