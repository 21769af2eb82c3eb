//! Saved-view CRUD and execution (§6 `/views`, `/views/{name}`, `/views/{name}/query`).

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::error::Result;
use crate::model::value::DocumentData;
use crate::model::view::{View, ViewPatch, ViewRuntimeOptions, ViewSpec};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/views",
    responses((status = 200, description = "View created")),
    tag = "views"
)]
pub async fn create_view(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Json(spec): Json<ViewSpec>,
) -> Result<Json<View>> {
    let created = state.collections.create_view(&auth.principal, &auth.extra_grants, spec).await?;
    Ok(Json(created))
}

#[utoipa::path(
    get,
    path = "/views",
    responses((status = 200, description = "Views visible to the caller")),
    tag = "views"
)]
pub async fn list_views(State(state): State<AppState>, AuthUser(auth): AuthUser) -> Result<Json<Vec<View>>> {
    let views = state.collections.list_views(&auth.principal, &auth.extra_grants).await?;
    Ok(Json(views))
}

#[utoipa::path(
    get,
    path = "/views/{name}",
    responses((status = 200, description = "View definition")),
    tag = "views"
)]
pub async fn get_view(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<View>> {
    let view = state.collections.get_view(&auth.principal, &auth.extra_grants, &name).await?;
    Ok(Json(view))
}

#[utoipa::path(
    put,
    path = "/views/{name}",
    responses((status = 200, description = "Updated view definition")),
    tag = "views"
)]
pub async fn update_view(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(patch): Json<ViewPatch>,
) -> Result<Json<View>> {
    let updated = state.collections.update_view(&auth.principal, &auth.extra_grants, &name, patch).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/views/{name}",
    responses((status = 200, description = "View deleted")),
    tag = "views"
)]
pub async fn delete_view(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.collections.delete_view(&auth.principal, &auth.extra_grants, &name).await?;
    Ok(Json(json!({ "message": format!("view '{name}' deleted") })))
}

#[utoipa::path(
    post,
    path = "/views/{name}/query",
    responses((status = 200, description = "Rows produced by the view")),
    tag = "views"
)]
pub async fn query_view(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(name): Path<String>,
    Json(runtime): Json<ViewRuntimeOptions>,
) -> Result<Json<Vec<DocumentData>>> {
    let rows = state.collections.query_view(&auth.principal, &auth.extra_grants, &name, runtime).await?;
    Ok(Json(rows))
}
