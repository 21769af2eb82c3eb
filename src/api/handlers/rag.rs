//! Retrieval-augmented generation (§4.F): RAG config binding, embedding job
//! management, and query-time retrieval, all scoped to `/collections/{name}`.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{CoreError, Result};
use crate::model::rag::{ChunkingStrategy, EmbeddingJob, RagAnswer, RagConfig};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetRagConfigRequest {
    pub target_field: String,
    pub provider_id: String,
    pub model: Option<String>,
    pub chunking_strategy: ChunkingStrategy,
    pub chunk_size: usize,
    #[serde(default)]
    pub chunk_overlap: usize,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[utoipa::path(
    put,
    path = "/collections/{name}/rag-config",
    responses((status = 200, description = "RAG config bound to this collection/field")),
    tag = "rag"
)]
pub async fn set_rag_config(
    State(state): State<AppState>,
    AuthUser(_auth): AuthUser,
    Path(name): Path<String>,
    Json(req): Json<SetRagConfigRequest>,
) -> Result<Json<RagConfig>> {
    let now = chrono::Utc::now();
    let config = RagConfig {
        id: Uuid::new_v4().to_string(),
        collection: name,
        target_field: req.target_field,
        provider_id: req.provider_id,
        model: req.model,
        chunking_strategy: req.chunking_strategy,
        chunk_size: req.chunk_size,
        chunk_overlap: req.chunk_overlap,
        active: req.active,
        created_at: now,
        updated_at: now,
    };
    let saved = state.rag.set_config(config).await?;
    Ok(Json(saved))
}

#[utoipa::path(
    get,
    path = "/collections/{name}/rag-config/{field}",
    responses((status = 200, description = "Active RAG config for this field")),
    tag = "rag"
)]
pub async fn get_rag_config(
    State(state): State<AppState>,
    AuthUser(_auth): AuthUser,
    Path((name, field)): Path<(String, String)>,
) -> Result<Json<RagConfig>> {
    state
        .rag
        .get_config(&name, &field)
        .map(Json)
        .ok_or_else(|| CoreError::NotFound(format!("rag config for '{name}'.'{field}'")))
}

#[derive(Debug, Deserialize)]
pub struct SubmitEmbeddingJobRequest {
    pub field: String,
    pub doc_ids: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/collections/{name}/embedding-jobs",
    responses((status = 200, description = "Embedding job queued")),
    tag = "rag"
)]
pub async fn submit_embedding_job(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(req): Json<SubmitEmbeddingJobRequest>,
) -> Result<Json<EmbeddingJob>> {
    let job = state
        .rag
        .submit_job(&auth.principal, &auth.extra_grants, &name, &req.field, req.doc_ids)
        .await?;
    Ok(Json(job))
}

#[utoipa::path(
    get,
    path = "/collections/{name}/embedding-jobs",
    responses((status = 200, description = "Embedding jobs for this collection")),
    tag = "rag"
)]
pub async fn list_embedding_jobs(
    State(state): State<AppState>,
    AuthUser(_auth): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Vec<EmbeddingJob>>> {
    Ok(Json(state.rag.list_jobs(&name)))
}

#[utoipa::path(
    get,
    path = "/embedding-jobs/{id}",
    responses((status = 200, description = "Embedding job status")),
    tag = "rag"
)]
pub async fn get_embedding_job(State(state): State<AppState>, AuthUser(_auth): AuthUser, Path(id): Path<String>) -> Result<Json<EmbeddingJob>> {
    Ok(Json(state.rag.get_job(&id)?))
}

#[utoipa::path(
    post,
    path = "/embedding-jobs/{id}/cancel",
    responses((status = 200, description = "Embedding job cancelled")),
    tag = "rag"
)]
pub async fn cancel_embedding_job(
    State(state): State<AppState>,
    AuthUser(_auth): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.rag.cancel_job(&id)?;
    Ok(Json(serde_json::json!({ "message": format!("embedding job '{id}' cancelled") })))
}

#[derive(Debug, Deserialize)]
pub struct QueryRagRequest {
    pub field: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Serialize)]
pub struct QueryRagResponse {
    pub hits: Vec<crate::model::rag::RagHit>,
    pub context: String,
}

#[utoipa::path(
    post,
    path = "/collections/{name}/rag-query",
    responses((status = 200, description = "Retrieved context and ranked hits")),
    tag = "rag"
)]
pub async fn query_rag(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(req): Json<QueryRagRequest>,
) -> Result<Json<QueryRagResponse>> {
    let RagAnswer { hits, context } = state
        .rag
        .query_rag(&auth.principal, &auth.extra_grants, &name, &req.field, &req.query, req.top_k)
        .await?;
    Ok(Json(QueryRagResponse { hits, context }))
}
