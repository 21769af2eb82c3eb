//! Component F: the RAG orchestrator (§4.F). Binds a vector field to an
//! embedding provider and a chunking policy, runs embedding jobs through a
//! per-`(collection, vector_field)` FIFO worker, and answers retrieval
//! queries by composing embed-query -> `VectorSearch` -> context window.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::collections::{metadata, CollectionService, VectorSearchQuery};
use crate::error::{CoreError, Result};
use crate::model::collection::{Collection, VectorField};
use crate::model::document::UpdateMode;
use crate::model::permission::{Action, PermissionSet, ResourceKind};
use crate::model::principal::Principal;
pub use crate::model::rag::{ChunkingStrategy, EmbeddingJob, JobProgress, JobStatus, RagAnswer, RagConfig, RagHit};
use crate::model::value::{DocumentData, Value};
use crate::rag::chunker::{ChunkerConfig, ChunkingStrategy as ChunkerStrategy, TextChunker};
use crate::rag::provider::{EmbeddingProvider, HashEmbeddingProvider};
use crate::rbac::RbacEvaluator;
use crate::storage::FindOptions;

/// Reserved metadata collections `RagConfig`/`EmbeddingJob` are persisted
/// into, mirroring `metadata::COLLECTIONS_META`/`VIEWS_META`.
pub const RAG_CONFIGS_META: &str = "rag_configs";
pub const EMBEDDING_JOBS_META: &str = "embedding_jobs";

fn config_key(collection: &str, field: &str) -> String {
    format!("{collection}:{field}")
}

fn to_chunker_strategy(strategy: ChunkingStrategy) -> ChunkerStrategy {
    match strategy {
        ChunkingStrategy::Word => ChunkerStrategy::Word,
        ChunkingStrategy::Character => ChunkerStrategy::Character,
        ChunkingStrategy::Semantic => ChunkerStrategy::Semantic,
    }
}

fn chunker_config_for(config: &RagConfig) -> ChunkerConfig {
    ChunkerConfig {
        strategy: to_chunker_strategy(config.chunking_strategy),
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
        ..ChunkerConfig::default()
    }
}

/// State shared between `RagOrchestrator` and its spawned drain workers.
/// `RagOrchestrator` is a thin `Arc<Shared>` handle so enqueuing a job can
/// clone exactly what a worker needs without requiring `Arc<Self>` receivers.
struct Shared {
    collections: Arc<CollectionService>,
    providers: Mutex<HashMap<String, Arc<dyn EmbeddingProvider>>>,
    configs: Mutex<HashMap<(String, String), RagConfig>>,
    jobs: Mutex<HashMap<String, EmbeddingJob>>,
    queues: Mutex<HashMap<(String, String), VecDeque<String>>>,
    active_workers: Mutex<HashSet<(String, String)>>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

/// The RAG orchestrator (§4.F). One instance is shared across all request
/// workers the same way `CollectionService` is; `CollectionService` holds a
/// handle back via `attach_rag_orchestrator` for the auto-embed hook.
#[derive(Clone)]
pub struct RagOrchestrator {
    shared: Arc<Shared>,
}

impl RagOrchestrator {
    pub fn new(collections: Arc<CollectionService>) -> Self {
        Self {
            shared: Arc::new(Shared {
                collections,
                providers: Mutex::new(HashMap::new()),
                configs: Mutex::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                active_workers: Mutex::new(HashSet::new()),
                cancellations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers a named embedding provider (e.g. a `FastEmbedProvider`
    /// wired up for a real model). Vector fields opt in via `provider_id`.
    pub fn register_provider(&self, provider_id: impl Into<String>, provider: Arc<dyn EmbeddingProvider>) {
        self.shared.providers.lock().insert(provider_id.into(), provider);
    }

    /// Persists `config` into the `rag_configs` metadata collection and
    /// installs it as the active binding for its `(collection, target_field)`
    /// key, replacing whatever was there before.
    pub async fn set_config(&self, config: RagConfig) -> Result<RagConfig> {
        let storage = self.shared.collections.storage();
        metadata::put(storage.as_ref(), RAG_CONFIGS_META, &config_key(&config.collection, &config.target_field), &config).await?;
        let key = (config.collection.clone(), config.target_field.clone());
        self.shared.configs.lock().insert(key, config.clone());
        Ok(config)
    }

    pub fn get_config(&self, collection: &str, field: &str) -> Option<RagConfig> {
        self.shared.configs.lock().get(&(collection.to_string(), field.to_string())).cloned()
    }

    /// Rehydrates the in-memory config cache from the `rag_configs`
    /// metadata collection. Call once at startup after construction —
    /// `RagOrchestrator::new` itself stays synchronous.
    pub async fn load_persisted_configs(&self) -> Result<()> {
        let storage = self.shared.collections.storage();
        let configs: Vec<RagConfig> = metadata::list(storage.as_ref(), RAG_CONFIGS_META).await?;
        let mut cache = self.shared.configs.lock();
        for config in configs {
            cache.insert((config.collection.clone(), config.target_field.clone()), config);
        }
        Ok(())
    }

    /// Submits an embedding job for `doc_ids` (or, if `None`, every live
    /// document in the collection). Requires the same `write` permission
    /// document mutations do, since the job writes into document fields.
    pub async fn submit_job(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection: &str,
        field: &str,
        doc_ids: Option<Vec<String>>,
    ) -> Result<EmbeddingJob> {
        let evaluator = RbacEvaluator::new(principal.clone(), extra_grants.clone());
        if !evaluator.allowed(ResourceKind::Collection, collection, Action::Write) {
            return Err(CoreError::Forbidden("insufficient permissions".into()));
        }
        let info = self.shared.collections.get_collection(principal, extra_grants, collection).await?;
        if !info.vector_fields.iter().any(|f| f.name == field) {
            return Err(CoreError::NotFound(format!("vector field '{field}'")));
        }
        Ok(self.enqueue(collection, field, doc_ids))
    }

    /// `CollectionService`'s post-commit hook (§4.F "Auto-embed"). Bypasses
    /// the RBAC/audit envelope — the mutation that triggered this already
    /// passed its own permission check and was logged.
    pub async fn enqueue_auto_embed(&self, collection: &str, field: &str, doc_id: String) {
        self.enqueue(collection, field, Some(vec![doc_id]));
    }

    fn enqueue(&self, collection: &str, field: &str, doc_ids: Option<Vec<String>>) -> EmbeddingJob {
        let job = EmbeddingJob::new_queued(collection, field, doc_ids);

        let key = (collection.to_string(), field.to_string());
        self.shared.jobs.lock().insert(job.id.clone(), job.clone());
        self.shared.cancellations.lock().insert(job.id.clone(), CancellationToken::new());
        self.shared.queues.lock().entry(key.clone()).or_default().push_back(job.id.clone());

        let shared = Arc::clone(&self.shared);
        let persisted = job.clone();
        tokio::spawn(async move { persist_job(&shared, &persisted).await });

        let should_spawn = self.shared.active_workers.lock().insert(key.clone());
        if should_spawn {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(drain_queue(key, shared));
        }
        job
    }

    /// Flips a queued job to `cancelled` immediately, or signals a running
    /// one to stop after its current document (§5 "Embedding job
    /// serialization").
    pub fn cancel_job(&self, job_id: &str) -> Result<()> {
        let token = self
            .shared
            .cancellations
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("embedding job '{job_id}'")))?;
        token.cancel();

        let mut jobs = self.shared.jobs.lock();
        if let Some(job) = jobs.get_mut(job_id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> Result<EmbeddingJob> {
        self.shared
            .jobs
            .lock()
            .get(job_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("embedding job '{job_id}'")))
    }

    pub fn list_jobs(&self, collection: &str) -> Vec<EmbeddingJob> {
        self.shared.jobs.lock().values().filter(|j| j.collection == collection).cloned().collect()
    }

    /// Used by the `RemoveVectorField` caller to populate the
    /// `has_active_job` flag `CollectionService::remove_vector_field` takes.
    pub fn has_active_job(&self, collection: &str, field: &str) -> bool {
        self.shared
            .jobs
            .lock()
            .values()
            .any(|j| j.collection == collection && j.target_field == field && matches!(j.status, JobStatus::Queued | JobStatus::Running))
    }

    /// `QueryRAG` (§4.F): embed the query, run `VectorSearch`, then
    /// assemble a context window from each hit's `source_fields`.
    pub async fn query_rag(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection: &str,
        field: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<RagAnswer> {
        let info = self.shared.collections.get_collection(principal, extra_grants, collection).await?;
        let vector_field = info
            .vector_fields
            .iter()
            .find(|f| f.name == field)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("vector field '{field}'")))?;

        let provider = resolve_provider(&self.shared, collection, &vector_field);
        let query_vector = provider.embed_one(query_text).await?;

        let hits = self
            .shared
            .collections
            .vector_search(
                principal,
                extra_grants,
                collection,
                VectorSearchQuery { field: field.to_string(), query_vector, top_k, extra_filter: None },
            )
            .await?;

        let storage = self.shared.collections.storage();
        let mut rag_hits = Vec::with_capacity(hits.len());
        let mut context_parts = Vec::with_capacity(hits.len());
        for hit in &hits {
            if let Some(doc) = storage.find_one_by_id(collection, &hit.document_id).await? {
                let text = vector_field
                    .source_fields
                    .iter()
                    .filter_map(|source| doc.data.get(source))
                    .filter_map(value_as_text)
                    .collect::<Vec<_>>()
                    .join("\n");
                if !text.trim().is_empty() {
                    context_parts.push(text.clone());
                }
                rag_hits.push(RagHit { document_id: hit.document_id.clone(), score: hit.score, text });
            }
        }

        Ok(RagAnswer { hits: rag_hits, context: context_parts.join("\n\n---\n\n") })
    }
}

async fn drain_queue(key: (String, String), shared: Arc<Shared>) {
    loop {
        let job_id = {
            let mut queues = shared.queues.lock();
            match queues.get_mut(&key).and_then(|q| q.pop_front()) {
                Some(id) => id,
                None => {
                    queues.remove(&key);
                    break;
                }
            }
        };
        run_job(&job_id, &shared).await;
    }
    shared.active_workers.lock().remove(&key);
}

async fn run_job(job_id: &str, shared: &Arc<Shared>) {
    let Some(mut job) = shared.jobs.lock().get(job_id).cloned() else { return };
    let cancel = shared.cancellations.lock().get(job_id).cloned().unwrap_or_default();

    if cancel.is_cancelled() {
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        shared.jobs.lock().insert(job_id.to_string(), job.clone());
        persist_job(shared, &job).await;
        return;
    }

    job.status = JobStatus::Running;
    job.started_at = Some(Utc::now());
    shared.jobs.lock().insert(job_id.to_string(), job.clone());
    persist_job(shared, &job).await;

    let outcome = process_job(&job, &cancel, shared).await;

    let mut final_job = shared.jobs.lock().get(job_id).cloned().unwrap_or(job);
    final_job.completed_at = Some(Utc::now());
    match outcome {
        Ok(done) => {
            final_job.progress.done = done;
            final_job.status = if cancel.is_cancelled() { JobStatus::Cancelled } else { JobStatus::Succeeded };
        }
        Err(err) => {
            final_job.status = JobStatus::Failed;
            final_job.error = Some(err.to_string());
        }
    }
    shared.jobs.lock().insert(job_id.to_string(), final_job.clone());
    persist_job(shared, &final_job).await;
}

/// Best-effort write-through of job state into the `embedding_jobs`
/// metadata collection. The in-memory `jobs` map stays the source of truth
/// for live scheduling; this only gives a restart something to read.
async fn persist_job(shared: &Shared, job: &EmbeddingJob) {
    let storage = shared.collections.storage();
    if let Err(err) = metadata::put(storage.as_ref(), EMBEDDING_JOBS_META, &job.id, job).await {
        tracing::warn!(job_id = %job.id, error = %err, "failed to persist embedding job state");
    }
}

async fn process_job(job: &EmbeddingJob, cancel: &CancellationToken, shared: &Arc<Shared>) -> Result<u64> {
    let storage = shared.collections.storage();
    let collection: Collection = metadata::get(storage.as_ref(), metadata::COLLECTIONS_META, &job.collection)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("collection '{}'", job.collection)))?;
    let field = collection
        .vector_fields
        .iter()
        .find(|f| f.name == job.target_field)
        .cloned()
        .ok_or_else(|| CoreError::NotFound(format!("vector field '{}'", job.target_field)))?;

    let documents = match &job.doc_ids {
        Some(ids) => {
            let mut docs = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(doc) = storage.find_one_by_id(&job.collection, id).await? {
                    docs.push(doc);
                }
            }
            docs
        }
        None => storage.find(&job.collection, &Default::default(), &FindOptions::default()).await?,
    };

    let total = documents.len() as u64;
    set_progress(shared, &job.id, 0, total).await;

    let provider = resolve_provider(shared, &job.collection, &field);
    let chunker = TextChunker::new(resolve_chunking(shared, &job.collection, &field.name));

    let mut done = 0u64;
    for document in &documents {
        if cancel.is_cancelled() {
            break;
        }

        let text = field
            .source_fields
            .iter()
            .filter_map(|source| document.data.get(source))
            .filter_map(value_as_text)
            .collect::<Vec<_>>()
            .join("\n");

        if !text.trim().is_empty() {
            let chunks = chunker.chunk(&text);
            let embedding = if chunks.len() <= 1 {
                provider.embed_one(&text).await?
            } else {
                let vectors = provider.embed_batch(&chunks).await?;
                average_vectors(&vectors, field.dimensions as usize)
            };

            let mut patch: DocumentData = DocumentData::new();
            patch.insert(field.name.clone(), Value::Vector(embedding.clone()));
            storage.update_one(&job.collection, &document.id, patch, UpdateMode::Patch, None).await?;
            storage.index_vector(&job.collection, &field.name, &document.id, &embedding).await?;
        }

        done += 1;
        set_progress(shared, &job.id, done, total).await;
    }

    Ok(done)
}

async fn set_progress(shared: &Shared, job_id: &str, done: u64, total: u64) {
    let snapshot = {
        let mut jobs = shared.jobs.lock();
        jobs.get_mut(job_id).map(|job| {
            job.progress = JobProgress { done, total };
            job.clone()
        })
    };
    if let Some(job) = snapshot {
        persist_job(shared, &job).await;
    }
}

fn active_config(shared: &Shared, collection: &str, field: &str) -> Option<RagConfig> {
    shared
        .configs
        .lock()
        .get(&(collection.to_string(), field.to_string()))
        .filter(|c| c.active)
        .cloned()
}

fn resolve_provider(shared: &Shared, collection: &str, field: &VectorField) -> Arc<dyn EmbeddingProvider> {
    let configured_id = active_config(shared, collection, &field.name).map(|c| c.provider_id);
    let provider_id = configured_id.or_else(|| field.provider_id.clone());

    if let Some(id) = provider_id {
        if let Some(provider) = shared.providers.lock().get(&id).cloned() {
            return provider;
        }
    }
    Arc::new(HashEmbeddingProvider::new(field.dimensions as usize))
}

fn resolve_chunking(shared: &Shared, collection: &str, field: &str) -> ChunkerConfig {
    active_config(shared, collection, field).map(|c| chunker_config_for(&c)).unwrap_or_default()
}

fn average_vectors(vectors: &[Vec<f32>], dimensions: usize) -> Vec<f32> {
    let mut sum = vec![0f32; dimensions];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let n = (vectors.len().max(1)) as f32;
    for x in &mut sum {
        *x /= n;
    }
    sum
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AccessLogSink, AccessLogWriter};
    use crate::model::collection::{CollectionSpec, IndexParams, IndexType, Metric};
    use crate::model::principal::{Role, User};
    use crate::model::value::DocumentData;
    use crate::storage::{MemoryAdapter, StorageAdapter};

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
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }))
    }

    async fn test_rig() -> (Arc<CollectionService>, RagOrchestrator) {
        let adapter = Arc::new(MemoryAdapter::new().await.unwrap());
        let sink: Arc<dyn AccessLogSink> = adapter.clone();
        let audit = Arc::new(AccessLogWriter::new(sink, 64));
        let storage: Arc<dyn StorageAdapter> = adapter;
        let collections = Arc::new(CollectionService::new(storage, audit).await.unwrap());
        let rag = RagOrchestrator::new(collections.clone());
        collections.attach_rag_orchestrator(Arc::new(rag.clone()));
        (collections, rag)
    }

    async fn wait_for_status(rag: &RagOrchestrator, job_id: &str, want: JobStatus) -> EmbeddingJob {
        for _ in 0..200 {
            let job = rag.get_job(job_id).unwrap();
            if job.status == want || matches!(job.status, JobStatus::Failed | JobStatus::Cancelled) {
                return job;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        rag.get_job(job_id).unwrap()
    }

    async fn make_collection_with_vector_field(collections: &CollectionService, admin: &Principal) {
        let grants = PermissionSet::default();
        collections
            .create_collection(
                admin,
                &grants,
                CollectionSpec { name: "articles".into(), description: String::new(), schema: None, settings: None },
            )
            .await
            .unwrap();
        collections
            .add_vector_field(
                admin,
                &grants,
                "articles",
                VectorField {
                    name: "embedding".into(),
                    dimensions: 8,
                    metric: Metric::Cosine,
                    index_type: IndexType::Hnsw,
                    index_params: IndexParams::Hnsw { m: 16, ef_construct: 200 },
                    auto_embed: true,
                    provider_id: None,
                    model: None,
                    source_fields: vec!["body".into()],
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn auto_embed_runs_after_insert_and_becomes_searchable() {
        let (collections, rag) = test_rig().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        make_collection_with_vector_field(&collections, &admin).await;

        let mut data = DocumentData::new();
        data.insert("body".into(), Value::String("hello from the embedding pipeline".into()));
        let inserted = collections.insert_document(&admin, &grants, "articles", data).await.unwrap();

        let jobs = loop {
            let jobs = rag.list_jobs("articles");
            if !jobs.is_empty() {
                break jobs;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        };
        let job = wait_for_status(&rag, &jobs[0].id, JobStatus::Succeeded).await;
        assert_eq!(job.status, JobStatus::Succeeded);

        let updated = collections.get_collection(&admin, &grants, "articles").await.unwrap();
        let field = updated.vector_fields.iter().find(|f| f.name == "embedding").unwrap();

        let result = rag
            .query_rag(&admin, &grants, "articles", &field.name, "hello from the embedding pipeline", 5)
            .await
            .unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].document_id, inserted.id);
        assert!(result.context.contains("hello from the embedding pipeline"));
    }

    #[tokio::test]
    async fn submit_job_without_write_permission_is_denied() {
        let (collections, rag) = test_rig().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        make_collection_with_vector_field(&collections, &admin).await;

        let regular = user(Role::Regular);
        let err = rag.submit_job(&regular, &grants, "articles", "embedding", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancel_queued_job_marks_it_cancelled() {
        let (collections, rag) = test_rig().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        make_collection_with_vector_field(&collections, &admin).await;

        let job = rag.submit_job(&admin, &grants, "articles", "embedding", Some(vec!["missing".into()])).await.unwrap();
        rag.cancel_job(&job.id).unwrap();
        let job = rag.get_job(&job.id).unwrap();
        assert!(matches!(job.status, JobStatus::Cancelled | JobStatus::Succeeded));
    }

    #[tokio::test]
    async fn has_active_job_reflects_queued_and_running_state() {
        let (collections, rag) = test_rig().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        make_collection_with_vector_field(&collections, &admin).await;

        assert!(!rag.has_active_job("articles", "embedding"));
        let job = rag.submit_job(&admin, &grants, "articles", "embedding", None).await.unwrap();
        let _ = wait_for_status(&rag, &job.id, JobStatus::Succeeded).await;
        assert!(!rag.has_active_job("articles", "embedding"));
    }
}
