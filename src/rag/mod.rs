//! Retrieval-Augmented Generation (§4.F): binds a vector field to an
//! embedding provider and a chunking policy, runs embedding jobs, and
//! answers `QueryRAG` calls.
//!
//! # Module structure
//!
//! - [`rag::provider`](crate::rag::provider) - `EmbeddingProvider` trait,
//!   the deterministic `HashEmbeddingProvider`, and the feature-gated
//!   `FastEmbedProvider`
//! - [`rag::embeddings`](crate::rag::embeddings) - the fastembed-backed
//!   model catalog `FastEmbedProvider` wraps (`local-embeddings` feature)
//! - [`rag::chunker`](crate::rag::chunker) - sliding-window text chunking
//!   for `source_fields` that exceed one embedding call's practical window
//! - [`rag::orchestrator`](crate::rag::orchestrator) - `RagOrchestrator`:
//!   `EmbeddingJob` scheduling and `QueryRAG`
//!
//! # Pipeline
//!
//! 1. A document mutation touches an `auto_embed` field's `source_fields`
//! 2. `CollectionService` enqueues a single-document `EmbeddingJob`
//! 3. The field's worker chunks the source text, embeds it, and writes the
//!    vector back onto the document
//! 4. `QueryRAG` embeds a caller's query, runs `VectorSearch`, and returns
//!    the hits plus a concatenated context window

pub mod chunker;
#[cfg(feature = "local-embeddings")]
pub mod embeddings;
pub mod orchestrator;
pub mod provider;

pub use crate::model::rag::{ChunkingStrategy, EmbeddingJob, JobProgress, JobStatus, RagAnswer, RagConfig, RagHit};
pub use orchestrator::RagOrchestrator;
pub use provider::{EmbeddingProvider, HashEmbeddingProvider};
