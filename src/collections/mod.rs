//! Component E: the collection/view service — the orchestration core that
//! every HTTP and MCP handler calls into.

pub mod metadata;
pub mod service;

pub use service::{CollectionService, DocumentQuery, HybridSearchQuery, VectorSearchQuery};
