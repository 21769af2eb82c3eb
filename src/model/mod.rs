//! Core data model: values, permissions, principals, collections,
//! documents, views, audit records, and RAG bookkeeping.

pub mod access_log;
pub mod collection;
pub mod document;
pub mod permission;
pub mod principal;
pub mod rag;
pub mod value;
pub mod view;

pub use access_log::{AccessLog, AccessResult};
pub use collection::{
    Collection, CollectionPatch, CollectionSettings, CollectionSpec, FieldSchema, IndexParams,
    IndexSpec, IndexType, Metric, Schema, VectorField,
};
pub use document::{Document, UpdateMode, VersionPrecondition};
pub use permission::{Action, NamePattern, PermissionSet, PermissionString, ResourceKind};
pub use principal::{AccessKeyRecord, Claims, Principal, Role, User};
pub use rag::{ChunkingStrategy, EmbeddingJob, JobProgress, JobStatus, RagAnswer, RagConfig, RagHit};
pub use value::{DocumentData, FieldType, Value};
pub use view::{PipelineStage, SortSpec, View, ViewPatch, ViewRuntimeOptions, ViewSpec};
