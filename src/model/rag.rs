//! RAG configuration and embedding-job bookkeeping (§4.F).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chunking strategy applied to source text before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    Word,
    Character,
    Semantic,
}

/// Binds a collection's vector field to an embedding provider and a
/// chunking policy. At most one active config per `(collection,
/// target_field)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub id: String,
    pub collection: String,
    pub target_field: String,
    pub provider_id: String,
    #[serde(default)]
    pub model: Option<String>,
    pub chunking_strategy: ChunkingStrategy,
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle state of an `EmbeddingJob` (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Progress counter for an in-flight job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub done: u64,
    pub total: u64,
}

/// A unit of embedding work targeting one vector field of one collection.
/// Jobs for the same `(collection, target_field)` are serialized by a
/// single worker so concurrent jobs never race on the same vector column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJob {
    pub id: String,
    pub collection: String,
    pub target_field: String,
    /// `None` means "re-embed every document in the collection".
    #[serde(default)]
    pub doc_ids: Option<Vec<String>>,
    pub status: JobStatus,
    pub progress: JobProgress,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EmbeddingJob {
    pub fn new_queued(collection: impl Into<String>, target_field: impl Into<String>, doc_ids: Option<Vec<String>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            collection: collection.into(),
            target_field: target_field.into(),
            doc_ids,
            status: JobStatus::Queued,
            progress: JobProgress::default(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Is this job currently occupying the field's serialization slot
    /// (§4.E RemoveVectorField precondition: refuse while queued or
    /// running)?
    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Queued | JobStatus::Running)
    }
}

/// Composed result of `QueryRAG` (§4.F): the retrieved hits plus a
/// concatenated context window for a downstream LLM call, which this
/// crate never performs itself.
#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub hits: Vec<RagHit>,
    pub context: String,
}

/// A single retrieved chunk, with enough provenance to cite it.
#[derive(Debug, Clone, Serialize)]
pub struct RagHit {
    pub document_id: String,
    pub score: f32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_queued_and_active() {
        let job = EmbeddingJob::new_queued("products", "embedding", None);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.is_active());
        assert!(!job.is_terminal());
    }

    #[test]
    fn terminal_statuses_are_not_active() {
        let mut job = EmbeddingJob::new_queued("products", "embedding", None);
        job.status = JobStatus::Succeeded;
        assert!(job.is_terminal());
        assert!(!job.is_active());
    }
}
