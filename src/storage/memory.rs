//! The in-process reference storage adapter.
//!
//! `MemoryAdapter` is the default, always-available `StorageAdapter`
//! implementation: documents live in a `parking_lot`-guarded map, and
//! vector columns are backed by `ares_vector::VectorDb` when their
//! `index_type` is `hnsw`, or a brute-force scan when it is `ivfflat` (a
//! list-based index isn't worth building for an in-memory reference
//! adapter, so `ivfflat` degrades to exact search here).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ares_vector::{Config as VectorDbConfig, DistanceMetric, VectorDb, VectorMetadata};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{CoreError, Result};
use crate::model::collection::{IndexSpec, Metric};
use crate::model::document::{Document, UpdateMode};
use crate::model::value::Value;
use crate::model::view::PipelineStage;
use crate::storage::filter::{self, Predicate};
use crate::storage::traits::{FindOptions, StorageAdapter, VectorHit};

fn to_distance_metric(metric: Metric) -> DistanceMetric {
    match metric {
        Metric::Cosine => DistanceMetric::Cosine,
        Metric::L2 => DistanceMetric::Euclidean,
        Metric::InnerProduct => DistanceMetric::DotProduct,
    }
}

struct VectorColumn {
    dimensions: u32,
    metric: Metric,
    /// `Some` for `hnsw` columns, keyed into the shared `VectorDb` under
    /// `hnsw_collection_key`. `None` for `ivfflat` columns, which scan
    /// `brute_force` instead.
    hnsw_collection_key: Option<String>,
    brute_force: HashMap<String, Vec<f32>>,
}

#[derive(Default)]
struct CollectionState {
    documents: HashMap<String, Document>,
    indexes: Vec<IndexSpec>,
    vector_columns: HashMap<String, VectorColumn>,
}

/// The in-memory reference `StorageAdapter`.
pub struct MemoryAdapter {
    collections: RwLock<HashMap<String, CollectionState>>,
    vector_db: VectorDb,
}

impl MemoryAdapter {
    pub async fn new() -> Result<Self> {
        let vector_db = VectorDb::open(VectorDbConfig::memory())
            .await
            .map_err(|e| CoreError::Internal(format!("failed to open vector engine: {e}")))?;
        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            vector_db,
        })
    }

    fn hnsw_key(collection: &str, field: &str) -> String {
        format!("{collection}::{field}")
    }

    fn with_collection<T>(
        &self,
        name: &str,
        f: impl FnOnce(&CollectionState) -> Result<T>,
    ) -> Result<T> {
        let guard = self.collections.read();
        let state = guard
            .get(name)
            .ok_or_else(|| CoreError::NotFound(format!("collection '{name}'")))?;
        f(state)
    }

    fn with_collection_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut CollectionState) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.collections.write();
        let state = guard
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(format!("collection '{name}'")))?;
        f(state)
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write();
        if collections.contains_key(name) {
            return Err(CoreError::Conflict(format!("collection '{name}' already exists")));
        }
        collections.insert(name.to_string(), CollectionState::default());
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write();
        collections
            .remove(name)
            .ok_or_else(|| CoreError::NotFound(format!("collection '{name}'")))?;
        Ok(())
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        self.with_collection_mut(collection, |state| {
            if state.indexes.iter().any(|i| i.name == index.name) {
                return Err(CoreError::Conflict(format!("index '{}' already exists", index.name)));
            }
            state.indexes.push(index.clone());
            Ok(())
        })
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>> {
        self.with_collection(collection, |state| Ok(state.indexes.clone()))
    }

    async fn drop_index(&self, collection: &str, index_name: &str) -> Result<()> {
        self.with_collection_mut(collection, |state| {
            let before = state.indexes.len();
            state.indexes.retain(|i| i.name != index_name);
            if state.indexes.len() == before {
                return Err(CoreError::NotFound(format!("index '{index_name}'")));
            }
            Ok(())
        })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Document> {
        self.with_collection_mut(collection, |state| {
            if state.documents.contains_key(&document.id) {
                return Err(CoreError::Conflict(format!("document '{}' already exists", document.id)));
            }
            state.documents.insert(document.id.clone(), document.clone());
            Ok(document)
        })
    }

    async fn find_one_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_collection(collection, |state| Ok(state.documents.get(id).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &BTreeMap<String, Value>,
        opts: &FindOptions,
    ) -> Result<Vec<Document>> {
        let predicate = filter::parse(filter)?;
        self.with_collection(collection, |state| {
            let mut rows: Vec<Document> = state
                .documents
                .values()
                .filter(|doc| filter::matches(&predicate, &filterable_row(doc)))
                .cloned()
                .collect();

            if let Some(sort) = &opts.sort {
                sort_documents(&mut rows, &sort.by, sort.descending);
            }

            let skip = opts.skip.unwrap_or(0) as usize;
            rows = rows.into_iter().skip(skip).collect();
            if let Some(limit) = opts.limit {
                rows.truncate(limit as usize);
            }
            Ok(rows)
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        id: &str,
        data: BTreeMap<String, Value>,
        mode: UpdateMode,
        if_version: Option<u64>,
    ) -> Result<Document> {
        self.with_collection_mut(collection, |state| {
            let doc = state
                .documents
                .get_mut(id)
                .ok_or_else(|| CoreError::NotFound(format!("document '{id}'")))?;

            if let Some(expected) = if_version {
                if doc.version != expected {
                    return Err(CoreError::Conflict(format!(
                        "document '{id}' version {} does not match expected {expected}",
                        doc.version
                    )));
                }
            }

            match mode {
                UpdateMode::Replace => doc.data = data,
                UpdateMode::Patch => {
                    for (key, value) in data {
                        if value.is_null() {
                            doc.data.remove(&key);
                        } else {
                            doc.data.insert(key, value);
                        }
                    }
                }
            }
            doc.version += 1;
            doc.updated_at = Utc::now();
            Ok(doc.clone())
        })
    }

    async fn delete_one(&self, collection: &str, id: &str, hard: bool) -> Result<()> {
        self.with_collection_mut(collection, |state| {
            if hard {
                state
                    .documents
                    .remove(id)
                    .ok_or_else(|| CoreError::NotFound(format!("document '{id}'")))?;
            } else {
                let doc = state
                    .documents
                    .get_mut(id)
                    .ok_or_else(|| CoreError::NotFound(format!("document '{id}'")))?;
                doc.deleted_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    async fn count(&self, collection: &str, filter: &BTreeMap<String, Value>) -> Result<u64> {
        let predicate = filter::parse(filter)?;
        self.with_collection(collection, |state| {
            Ok(state
                .documents
                .values()
                .filter(|doc| filter::matches(&predicate, &filterable_row(doc)))
                .count() as u64)
        })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[PipelineStage],
    ) -> Result<Vec<BTreeMap<String, Value>>> {
        let rows = self.with_collection(collection, |state| {
            Ok(state.documents.values().map(filterable_row).collect::<Vec<_>>())
        })?;
        let mut results = run_pipeline(rows, pipeline)?;
        // `deleted_at` was only synthesized so `$match` stages could see it;
        // it's a reserved field and must not leak into aggregate output
        // unless a `$project` stage explicitly asked for it.
        let projects_deleted_at = pipeline
            .iter()
            .any(|stage| matches!(stage, PipelineStage::Project { fields } if fields.contains(&"deleted_at".to_string())));
        if !projects_deleted_at {
            for row in &mut results {
                row.remove("deleted_at");
            }
        }
        Ok(results)
    }

    async fn create_vector_column(
        &self,
        collection: &str,
        field: &str,
        dimensions: u32,
        metric: Metric,
    ) -> Result<()> {
        self.with_collection_mut(collection, |state| {
            if state.vector_columns.contains_key(field) {
                return Err(CoreError::Conflict(format!("vector field '{field}' already exists")));
            }
            state.vector_columns.insert(
                field.to_string(),
                VectorColumn {
                    dimensions,
                    metric,
                    hnsw_collection_key: None,
                    brute_force: HashMap::new(),
                },
            );
            Ok(())
        })?;

        self.vector_db
            .create_collection(&Self::hnsw_key(collection, field), dimensions as usize, to_distance_metric(metric))
            .await
            .map_err(|e| CoreError::Internal(format!("failed to create vector engine collection: {e}")))?;

        self.with_collection_mut(collection, |state| {
            if let Some(col) = state.vector_columns.get_mut(field) {
                col.hnsw_collection_key = Some(Self::hnsw_key(collection, field));
            }
            Ok(())
        })
    }

    async fn drop_vector_column(&self, collection: &str, field: &str) -> Result<()> {
        self.with_collection_mut(collection, |state| {
            state
                .vector_columns
                .remove(field)
                .ok_or_else(|| CoreError::NotFound(format!("vector field '{field}'")))?;
            Ok(())
        })?;
        let _ = self.vector_db.delete_collection(&Self::hnsw_key(collection, field)).await;
        Ok(())
    }

    async fn index_vector(&self, collection: &str, field: &str, document_id: &str, vector: &[f32]) -> Result<()> {
        let use_hnsw = self.with_collection(collection, |state| {
            let col = state
                .vector_columns
                .get(field)
                .ok_or_else(|| CoreError::NotFound(format!("vector field '{field}'")))?;
            Ok(col.hnsw_collection_key.is_some())
        })?;

        if use_hnsw {
            self.vector_db
                .insert(&Self::hnsw_key(collection, field), document_id, vector, None)
                .await
                .map_err(|e| CoreError::Internal(format!("failed to index vector: {e}")))?;
        } else {
            self.with_collection_mut(collection, |state| {
                let col = state.vector_columns.get_mut(field).unwrap();
                col.brute_force.insert(document_id.to_string(), vector.to_vec());
                Ok(())
            })?;
        }
        Ok(())
    }

    async fn vector_search(
        &self,
        collection: &str,
        field: &str,
        query_vector: &[f32],
        top_k: usize,
        extra_filter: Option<&BTreeMap<String, Value>>,
    ) -> Result<Vec<VectorHit>> {
        let (metric, use_hnsw) = self.with_collection(collection, |state| {
            let col = state
                .vector_columns
                .get(field)
                .ok_or_else(|| CoreError::NotFound(format!("vector field '{field}'")))?;
            Ok((col.metric, col.hnsw_collection_key.is_some()))
        })?;

        let predicate = match extra_filter {
            Some(f) => Some(filter::parse(f)?),
            None => None,
        };

        let candidates: Vec<(String, f32)> = if use_hnsw {
            // Over-fetch so post-filtering by extra_filter still has
            // enough candidates left to satisfy top_k.
            let fetch = (top_k * 4).max(top_k).max(16);
            self.vector_db
                .search(&Self::hnsw_key(collection, field), query_vector, fetch)
                .await
                .map_err(|e| CoreError::Internal(format!("vector search failed: {e}")))?
                .into_iter()
                .map(|r| (r.id, r.score))
                .collect()
        } else {
            self.with_collection(collection, |state| {
                let col = state.vector_columns.get(field).unwrap();
                Ok(col
                    .brute_force
                    .iter()
                    .map(|(id, v)| (id.clone(), score_by_metric(metric, query_vector, v)))
                    .collect())
            })?
        };

        self.with_collection(collection, |state| {
            let mut hits: Vec<VectorHit> = candidates
                .into_iter()
                .filter(|(id, _)| match &predicate {
                    None => true,
                    Some(p) => state
                        .documents
                        .get(id)
                        .is_some_and(|doc| filter::matches(p, &filterable_row(doc))),
                })
                .map(|(document_id, score)| VectorHit { document_id, score })
                .collect();
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(top_k);
            Ok(hits)
        })
    }

    async fn hybrid_search(
        &self,
        collection: &str,
        field: &str,
        query_vector: &[f32],
        text_query: &str,
        top_k: usize,
        alpha: f32,
        extra_filter: Option<&BTreeMap<String, Value>>,
    ) -> Result<Vec<VectorHit>> {
        let fetch = (top_k * 4).max(top_k).max(16);
        let vector_hits = self
            .vector_search(collection, field, query_vector, fetch, extra_filter)
            .await?;

        let query_tokens = tokenize(text_query);
        let mut hits: Vec<VectorHit> = self.with_collection(collection, |state| {
            Ok(vector_hits
                .into_iter()
                .map(|hit| {
                    let text_score = state
                        .documents
                        .get(&hit.document_id)
                        .map(|doc| token_overlap_score(&query_tokens, &doc.data))
                        .unwrap_or(0.0);
                    let combined = alpha * hit.score + (1.0 - alpha) * text_score;
                    VectorHit {
                        document_id: hit.document_id,
                        score: combined,
                    }
                })
                .collect())
        })?;

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// `Document.deleted_at` lives outside `data` (it's a reserved field a
/// client payload can never contain), but `{"deleted_at": null}` is how
/// callers express "exclude tombstones" against any adapter (§4.A). Merge
/// the real tombstone state into the map handed to the filter predicate so
/// that clause actually discriminates instead of matching every row via the
/// absent-key-equals-null rule.
fn filterable_row(doc: &Document) -> BTreeMap<String, Value> {
    let mut row = doc.data.clone();
    let deleted_at = match doc.deleted_at {
        Some(ts) => Value::String(ts.to_rfc3339()),
        None => Value::Null,
    };
    row.insert("deleted_at".to_string(), deleted_at);
    row
}

fn sort_documents(rows: &mut [Document], by: &str, descending: bool) {
    rows.sort_by(|a, b| {
        let ordering = match (a.data.get(by), b.data.get(by)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => std::cmp::Ordering::Equal,
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => std::cmp::Ordering::Equal,
    }
}

fn score_by_metric(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Cosine => cosine_similarity(a, b),
        Metric::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        Metric::L2 => {
            let dist: f32 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt();
            -dist
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

/// A crude lexical score: fraction of query tokens found verbatim in any
/// string-valued field of the document. Good enough to blend with vector
/// similarity in `hybrid_search`; a real BM25 implementation is out of
/// scope for the in-memory reference adapter.
fn token_overlap_score(query_tokens: &[String], data: &BTreeMap<String, Value>) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let haystack: String = data
        .values()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.to_lowercase()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ");

    let hits = query_tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f32 / query_tokens.len() as f32
}

fn run_pipeline(
    mut rows: Vec<BTreeMap<String, Value>>,
    pipeline: &[PipelineStage],
) -> Result<Vec<BTreeMap<String, Value>>> {
    for stage in pipeline {
        rows = match stage {
            PipelineStage::Match { filter } => {
                let predicate: Predicate = filter::parse(filter)?;
                rows.into_iter().filter(|row| filter::matches(&predicate, row)).collect()
            }
            PipelineStage::Project { fields } => rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter(|(key, _)| fields.contains(key))
                        .collect::<BTreeMap<_, _>>()
                })
                .collect(),
            PipelineStage::Sort { by, descending } => {
                rows.sort_by(|a, b| {
                    let ordering = match (a.get(by), b.get(by)) {
                        (Some(x), Some(y)) => compare_values(x, y),
                        (Some(_), None) => std::cmp::Ordering::Greater,
                        (None, Some(_)) => std::cmp::Ordering::Less,
                        (None, None) => std::cmp::Ordering::Equal,
                    };
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
                rows
            }
            PipelineStage::Limit { count } => {
                rows.truncate(*count as usize);
                rows
            }
            PipelineStage::Skip { count } => rows.into_iter().skip(*count as usize).collect(),
            PipelineStage::Group { by, count_as } => {
                let mut groups: BTreeMap<String, u64> = BTreeMap::new();
                for row in &rows {
                    let key = row
                        .get(by)
                        .map(|v| format!("{v:?}"))
                        .unwrap_or_else(|| "null".to_string());
                    *groups.entry(key).or_insert(0) += 1;
                }
                let count_field = count_as.clone().unwrap_or_else(|| "count".to_string());
                groups
                    .into_iter()
                    .map(|(key, count)| {
                        BTreeMap::from([
                            (by.clone(), Value::String(key)),
                            (count_field.clone(), Value::Integer(count as i64)),
                        ])
                    })
                    .collect()
            }
        };
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, pairs: Vec<(&str, Value)>) -> Document {
        Document {
            id: id.to_string(),
            collection: "products".into(),
            data: pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn create_collection_rejects_duplicate_name() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        let result = adapter.create_collection("products").await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn insert_then_find_one_by_id_round_trips() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        let inserted = adapter
            .insert_one("products", doc("p1", vec![("name", Value::String("Pen".into()))]))
            .await
            .unwrap();
        let found = adapter.find_one_by_id("products", &inserted.id).await.unwrap();
        assert_eq!(found.unwrap().id, "p1");
    }

    #[tokio::test]
    async fn update_one_with_version_mismatch_conflicts() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        adapter
            .insert_one("products", doc("p1", vec![("name", Value::String("Pen".into()))]))
            .await
            .unwrap();

        let result = adapter
            .update_one(
                "products",
                "p1",
                BTreeMap::from([("name".to_string(), Value::String("Pencil".into()))]),
                UpdateMode::Replace,
                Some(99),
            )
            .await;
        assert!(matches!(result, Err(CoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn soft_delete_sets_tombstone_without_removing_row() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        adapter
            .insert_one("products", doc("p1", vec![]))
            .await
            .unwrap();
        adapter.delete_one("products", "p1", false).await.unwrap();
        let found = adapter.find_one_by_id("products", "p1").await.unwrap().unwrap();
        assert!(found.deleted_at.is_some());
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_excluded_by_deleted_at_null_filter() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        adapter.insert_one("products", doc("p1", vec![])).await.unwrap();
        adapter.insert_one("products", doc("p2", vec![])).await.unwrap();
        adapter.delete_one("products", "p1", false).await.unwrap();

        let not_deleted = BTreeMap::from([("deleted_at".to_string(), Value::Null)]);

        let rows = adapter.find("products", &not_deleted, &FindOptions::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "p2");

        let count = adapter.count("products", &not_deleted).await.unwrap();
        assert_eq!(count, 1);

        let aggregated = adapter
            .aggregate("products", &[PipelineStage::Match { filter: not_deleted }])
            .await
            .unwrap();
        assert_eq!(aggregated.len(), 1);
        assert!(!aggregated[0].contains_key("deleted_at"));
    }

    #[tokio::test]
    async fn find_respects_filter_sort_and_limit() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        for (id, price) in [("p1", 1), ("p2", 5), ("p3", 9)] {
            adapter
                .insert_one("products", doc(id, vec![("price", Value::Integer(price))]))
                .await
                .unwrap();
        }
        let rows = adapter
            .find(
                "products",
                &BTreeMap::from([(
                    "price".to_string(),
                    Value::Object(BTreeMap::from([("$gte".to_string(), Value::Integer(2))])),
                )]),
                &FindOptions {
                    sort: Some(crate::storage::traits::Sort { by: "price".into(), descending: true }),
                    limit: Some(1),
                    skip: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "p3");
    }

    #[tokio::test]
    async fn vector_search_returns_nearest_neighbor_first() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        adapter
            .create_vector_column("products", "embedding", 3, Metric::Cosine)
            .await
            .unwrap();

        for (id, vector) in [("p1", [1.0, 0.0, 0.0]), ("p2", [0.0, 1.0, 0.0])] {
            adapter
                .insert_one(
                    "products",
                    doc(id, vec![("embedding", Value::Array(vec![
                        Value::Number(vector[0] as f64),
                        Value::Number(vector[1] as f64),
                        Value::Number(vector[2] as f64),
                    ]))]),
                )
                .await
                .unwrap();
            adapter
                .vector_db
                .insert(&MemoryAdapter::hnsw_key("products", "embedding"), id, &vector, None)
                .await
                .unwrap();
        }

        let hits = adapter
            .vector_search("products", "embedding", &[1.0, 0.0, 0.0], 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "p1");
    }

    #[tokio::test]
    async fn aggregate_match_then_limit() {
        let adapter = MemoryAdapter::new().await.unwrap();
        adapter.create_collection("products").await.unwrap();
        for (id, price) in [("p1", 1), ("p2", 5), ("p3", 9)] {
            adapter
                .insert_one("products", doc(id, vec![("price", Value::Integer(price))]))
                .await
                .unwrap();
        }
        let pipeline = vec![
            PipelineStage::Match {
                filter: BTreeMap::from([(
                    "price".to_string(),
                    Value::Object(BTreeMap::from([("$gt".to_string(), Value::Integer(1))])),
                )]),
            },
            PipelineStage::Limit { count: 1 },
        ];
        let rows = adapter.aggregate("products", &pipeline).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
