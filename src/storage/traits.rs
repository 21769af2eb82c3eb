//! The capability set the core consumes from a storage backend (§4.A).

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::model::collection::{IndexSpec, Metric};
use crate::model::document::{Document, UpdateMode};
use crate::model::value::Value;
use crate::model::view::PipelineStage;

/// A sort key/direction pair for `find`.
#[derive(Debug, Clone)]
pub struct Sort {
    pub by: String,
    pub descending: bool,
}

/// Parameters for a `find` scan.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// A single vector search hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VectorHit {
    pub document_id: String,
    pub score: f32,
}

/// Document CRUD, aggregate, and vector operations a storage backend must
/// provide. One implementation is shared across all request workers and
/// must be internally thread-safe (§5 "Shared resources").
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    // ---- Collection-level (metadata) lifecycle ----

    async fn create_collection(&self, name: &str) -> Result<()>;
    async fn drop_collection(&self, name: &str) -> Result<()>;
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>>;
    async fn drop_index(&self, collection: &str, index_name: &str) -> Result<()>;

    // ---- Document CRUD ----

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Document>;
    async fn find_one_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;
    async fn find(
        &self,
        collection: &str,
        filter: &BTreeMap<String, Value>,
        opts: &FindOptions,
    ) -> Result<Vec<Document>>;
    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        data: BTreeMap<String, Value>,
        mode: UpdateMode,
        if_version: Option<u64>,
    ) -> Result<Document>;
    async fn delete_one(&self, collection: &str, id: &str, hard: bool) -> Result<()>;
    async fn count(&self, collection: &str, filter: &BTreeMap<String, Value>) -> Result<u64>;
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[PipelineStage],
    ) -> Result<Vec<BTreeMap<String, Value>>>;

    // ---- Vector operations ----

    async fn create_vector_column(
        &self,
        collection: &str,
        field: &str,
        dimensions: u32,
        metric: Metric,
    ) -> Result<()>;
    async fn drop_vector_column(&self, collection: &str, field: &str) -> Result<()>;
    /// Write (or overwrite) a document's entry in a vector column's index.
    /// Document CRUD only touches `Document.data`; callers that want a
    /// vector field searchable call this once the write to `data` commits.
    async fn index_vector(&self, collection: &str, field: &str, document_id: &str, vector: &[f32]) -> Result<()>;
    async fn vector_search(
        &self,
        collection: &str,
        field: &str,
        query_vector: &[f32],
        top_k: usize,
        extra_filter: Option<&BTreeMap<String, Value>>,
    ) -> Result<Vec<VectorHit>>;
    /// Combine vector similarity with a text query (§3 VectorStore).
    /// `alpha` weights the vector score against the text score, `alpha=1.0`
    /// is pure vector search, `alpha=0.0` is pure text search.
    async fn hybrid_search(
        &self,
        collection: &str,
        field: &str,
        query_vector: &[f32],
        text_query: &str,
        top_k: usize,
        alpha: f32,
        extra_filter: Option<&BTreeMap<String, Value>>,
    ) -> Result<Vec<VectorHit>>;
}
