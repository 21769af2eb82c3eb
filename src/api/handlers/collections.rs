//! Collection CRUD (§6 `/collections`, `/collections/{name}`).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::error::Result;
use crate::model::collection::{Collection, CollectionPatch, CollectionSpec};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/collections",
    responses((status = 200, description = "Collection created")),
    tag = "collections"
)]
pub async fn create_collection(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Json(spec): Json<CollectionSpec>,
) -> Result<Json<Collection>> {
    let created = state
        .collections
        .create_collection(&auth.principal, &auth.extra_grants, spec)
        .await?;
    Ok(Json(created))
}

#[utoipa::path(
    get,
    path = "/collections",
    responses((status = 200, description = "Collections visible to the caller")),
    tag = "collections"
)]
pub async fn list_collections(State(state): State<AppState>, AuthUser(auth): AuthUser) -> Result<Json<Vec<Collection>>> {
    let collections = state.collections.list_collections(&auth.principal, &auth.extra_grants).await?;
    Ok(Json(collections))
}

#[utoipa::path(
    get,
    path = "/collections/{name}",
    responses((status = 200, description = "Collection metadata")),
    tag = "collections"
)]
pub async fn get_collection(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Collection>> {
    let collection = state.collections.get_collection(&auth.principal, &auth.extra_grants, &name).await?;
    Ok(Json(collection))
}

#[utoipa::path(
    put,
    path = "/collections/{name}",
    responses((status = 200, description = "Updated collection metadata")),
    tag = "collections"
)]
pub async fn update_collection(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(patch): Json<CollectionPatch>,
) -> Result<Json<Collection>> {
    let updated = state
        .collections
        .update_collection(&auth.principal, &auth.extra_grants, &name, patch)
        .await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteCollectionParams {
    #[serde(default)]
    pub force: bool,
}

#[utoipa::path(
    delete,
    path = "/collections/{name}",
    responses((status = 200, description = "Collection deleted")),
    tag = "collections"
)]
pub async fn delete_collection(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Query(params): Query<DeleteCollectionParams>,
) -> Result<Json<serde_json::Value>> {
    state
        .collections
        .delete_collection(&auth.principal, &auth.extra_grants, &name, params.force)
        .await?;
    Ok(Json(json!({ "message": format!("collection '{name}' deleted") })))
}
