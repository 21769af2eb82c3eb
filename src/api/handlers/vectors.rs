//! Vector fields and similarity search (§6 `/collections/{name}/vector-fields`,
//! `/collections/{name}/vector-search`, `/collections/{name}/hybrid-search`).

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::collections::{HybridSearchQuery, VectorSearchQuery};
use crate::error::Result;
use crate::model::collection::{Collection, VectorField};
use crate::storage::VectorHit;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/collections/{name}/vector-fields",
    responses((status = 200, description = "Vector field added")),
    tag = "vectors"
)]
pub async fn add_vector_field(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(field): Json<VectorField>,
) -> Result<Json<Collection>> {
    let updated = state.collections.add_vector_field(&auth.principal, &auth.extra_grants, &name, field).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/collections/{name}/vector-fields",
    responses((status = 200, description = "Vector fields on this collection")),
    tag = "vectors"
)]
pub async fn list_vector_fields(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Vec<VectorField>>> {
    let fields = state.collections.list_vector_fields(&auth.principal, &auth.extra_grants, &name).await?;
    Ok(Json(fields))
}

#[utoipa::path(
    delete,
    path = "/collections/{name}/vector-fields/{field}",
    responses((status = 200, description = "Vector field removed")),
    tag = "vectors"
)]
pub async fn remove_vector_field(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path((name, field)): Path<(String, String)>,
) -> Result<Json<Collection>> {
    let has_active_job = state.rag.has_active_job(&name, &field);
    let updated = state
        .collections
        .remove_vector_field(&auth.principal, &auth.extra_grants, &name, &field, has_active_job)
        .await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct VectorSearchRequest {
    pub field: String,
    pub query_vector: Vec<f32>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filter: std::collections::BTreeMap<String, crate::model::value::Value>,
}

fn default_top_k() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<VectorHit>,
    pub count: usize,
}

#[utoipa::path(
    post,
    path = "/collections/{name}/vector-search",
    responses((status = 200, description = "Nearest-neighbor hits")),
    tag = "vectors"
)]
pub async fn vector_search(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(req): Json<VectorSearchRequest>,
) -> Result<Json<SearchResponse>> {
    let query = VectorSearchQuery {
        field: req.field,
        query_vector: req.query_vector,
        top_k: req.top_k,
        extra_filter: if req.filter.is_empty() { None } else { Some(req.filter) },
    };
    let results = state.collections.vector_search(&auth.principal, &auth.extra_grants, &name, query).await?;
    let count = results.len();
    Ok(Json(SearchResponse { results, count }))
}

#[derive(Debug, Deserialize)]
pub struct HybridSearchRequest {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub text_query: String,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub filter: std::collections::BTreeMap<String, crate::model::value::Value>,
}

fn default_alpha() -> f32 {
    0.5
}

#[utoipa::path(
    post,
    path = "/collections/{name}/hybrid-search",
    responses((status = 200, description = "Blended vector/text hits")),
    tag = "vectors"
)]
pub async fn hybrid_search(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(req): Json<HybridSearchRequest>,
) -> Result<Json<SearchResponse>> {
    let query = HybridSearchQuery {
        field: req.field,
        query_vector: req.query_vector,
        text_query: req.text_query,
        alpha: req.alpha,
        top_k: req.top_k,
        extra_filter: if req.filter.is_empty() { None } else { Some(req.filter) },
    };
    let results = state.collections.hybrid_search(&auth.principal, &auth.extra_grants, &name, query).await?;
    let count = results.len();
    Ok(Json(SearchResponse { results, count }))
}
