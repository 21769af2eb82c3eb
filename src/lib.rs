//! # AnyBase
//!
//! A multi-tenant document-and-vector backend: collections with optional
//! JSON-Schema validation, saved views, vector fields with HNSW/IVFFlat
//! search, RBAC down to the per-resource/per-action grant, and a
//! retrieval-augmented-generation layer bound directly to those collections.
//!
//! ## Modules
//!
//! - [`model`] — core data types: values, permissions, principals,
//!   collections, documents, views, access-log records, RAG bookkeeping.
//! - [`storage`] — the `StorageAdapter` trait, its filter language, and the
//!   in-memory reference adapter.
//! - [`schema`] — per-collection JSON-Schema-like validation.
//! - [`rbac`] — the permission evaluator every operation consults.
//! - [`access_keys`] — long-lived API key issuance and verification.
//! - [`collections`] — the orchestration core binding RBAC, storage, and
//!   the audit trail into one request envelope per operation.
//! - [`rag`] — embedding providers, chunking, and the orchestrator that
//!   runs embedding jobs and answers retrieval queries.
//! - [`audit`] — the access-log writer every RBAC decision passes through.
//! - [`auth`] — JWT/password login and the dual JWT/API-key middleware.
//! - [`config`] — TOML configuration with environment overrides.
//! - [`api`] — the HTTP surface: routes and handlers.
//! - [`mcp`] — the Model Context Protocol JSON-RPC surface.
//!
//! ## Configuration
//!
//! `anybase.toml` (or the path named by `ANYBASE_CONFIG`) holds server,
//! auth, rate-limit, and audit settings; `ANYBASE__SERVER__PORT`-style
//! environment variables override individual fields. See [`config`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Access-key issuance, verification, and ownership-scoped management.
pub mod access_keys;
/// HTTP API routes and handlers.
pub mod api;
/// JWT authentication and the request-resolving middleware.
pub mod auth;
/// Bounded, fire-and-forget access log writer.
pub mod audit;
/// The collection/view service: the orchestration core.
pub mod collections;
/// TOML configuration with environment overrides.
pub mod config;
/// Core error type shared across every component.
pub mod error;
/// Model Context Protocol (MCP) JSON-RPC surface.
pub mod mcp;
/// Core data model: values, permissions, principals, collections, views.
pub mod model;
/// Retrieval-augmented-generation: embedding providers, chunking, orchestrator.
pub mod rag;
/// Role-based access control evaluation.
pub mod rbac;
/// Per-collection schema validation.
pub mod schema;
/// Storage adapter trait, filter language, and the in-memory reference adapter.
pub mod storage;

use std::sync::Arc;

use crate::access_keys::{AccessKeyRegistry, StorageAccessKeyStore};
use crate::auth::jwt::AuthService;
use crate::auth::middleware::AuthContext;
use crate::auth::users::UserStore;
use crate::collections::CollectionService;
use crate::config::AnyBaseConfig;
use crate::rag::RagOrchestrator;

/// Everything a handler needs, threaded through as axum `State`.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration (server/auth/rate-limit/audit settings).
    pub config: Arc<AnyBaseConfig>,
    /// The collection/view orchestration core.
    pub collections: Arc<CollectionService>,
    /// The RAG orchestrator bound to `collections`.
    pub rag: Arc<RagOrchestrator>,
    /// `User` persistence, for the login/refresh handlers and admin seeding.
    pub users: Arc<UserStore>,
    /// Password hashing and JWT issuance/verification.
    pub auth_service: Arc<AuthService>,
    /// Access-key issuance and verification.
    pub access_keys: Arc<AccessKeyRegistry<StorageAccessKeyStore>>,
}

impl AppState {
    /// The subset of state the auth middleware needs to resolve a principal.
    pub fn auth_context(&self) -> AuthContext {
        AuthContext {
            auth_service: self.auth_service.clone(),
            users: self.users.clone(),
            access_keys: self.access_keys.clone(),
        }
    }
}
