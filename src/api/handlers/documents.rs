//! Document CRUD (§6 `/data/{collection}`, `/data/{collection}/{id}`).

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::collections::DocumentQuery;
use crate::error::{CoreError, Result};
use crate::model::document::{Document, UpdateMode, VersionPrecondition};
use crate::model::value::{DocumentData, Value};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListDocumentsParams {
    pub filter: Option<String>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_desc: bool,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub projection: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ListDocumentsResponse {
    pub data: Vec<DocumentData>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

fn parse_filter(raw: Option<&str>) -> Result<BTreeMap<String, Value>> {
    let Some(raw) = raw else { return Ok(BTreeMap::new()) };
    let json: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| CoreError::BadRequest(format!("invalid filter: {e}")))?;
    let value = Value::from_json(json);
    match value.as_object() {
        Some(obj) => Ok(obj.clone()),
        None => Err(CoreError::BadRequest("filter must be a JSON object".into())),
    }
}

#[utoipa::path(
    post,
    path = "/data/{collection}",
    responses((status = 200, description = "Document inserted")),
    tag = "documents"
)]
pub async fn insert_document(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(collection): Path<String>,
    Json(data): Json<DocumentData>,
) -> Result<Json<Document>> {
    let created = state
        .collections
        .insert_document(&auth.principal, &auth.extra_grants, &collection, data)
        .await?;
    Ok(Json(created))
}

#[utoipa::path(
    get,
    path = "/data/{collection}",
    responses((status = 200, description = "Matching documents, paginated")),
    tag = "documents"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(collection): Path<String>,
    Query(params): Query<ListDocumentsParams>,
) -> Result<Json<ListDocumentsResponse>> {
    let filter = parse_filter(params.filter.as_deref())?;
    let limit = params.limit.unwrap_or(20);
    let skip = params.skip.unwrap_or(0);
    let projection = params.projection.as_ref().map(|p| p.split(',').map(|s| s.trim().to_string()).collect());
    let sort = params.sort_by.map(|by| crate::storage::Sort { by, descending: params.sort_desc });

    let query = DocumentQuery {
        filter: filter.clone(),
        sort,
        limit: Some(limit),
        skip: Some(skip),
        projection,
        include_deleted: params.include_deleted,
    };

    let total = state
        .collections
        .count_documents(&auth.principal, &auth.extra_grants, &collection, filter, params.include_deleted)
        .await?;
    let data = state.collections.query_documents(&auth.principal, &auth.extra_grants, &collection, query).await?;

    let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
    let page = if limit == 0 { 1 } else { skip / limit + 1 };

    Ok(Json(ListDocumentsResponse {
        data,
        total,
        page,
        limit,
        total_pages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct GetDocumentParams {
    #[serde(default)]
    pub include_deleted: bool,
}

#[utoipa::path(
    get,
    path = "/data/{collection}/{id}",
    responses((status = 200, description = "Document contents")),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<GetDocumentParams>,
) -> Result<Json<DocumentData>> {
    let data = state
        .collections
        .get_document(&auth.principal, &auth.extra_grants, &collection, &id, params.include_deleted)
        .await?;
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentParams {
    #[serde(default)]
    pub replace: bool,
    pub if_version: Option<u64>,
}

#[utoipa::path(
    put,
    path = "/data/{collection}/{id}",
    responses((status = 200, description = "Updated document")),
    tag = "documents"
)]
pub async fn update_document(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<UpdateDocumentParams>,
    Json(data): Json<DocumentData>,
) -> Result<Json<Document>> {
    let mode = if params.replace { UpdateMode::Replace } else { UpdateMode::Patch };
    let updated = state
        .collections
        .update_document(
            &auth.principal,
            &auth.extra_grants,
            &collection,
            &id,
            data,
            mode,
            VersionPrecondition { if_version: params.if_version },
        )
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/data/{collection}/{id}",
    responses((status = 200, description = "Document deleted")),
    tag = "documents"
)]
pub async fn delete_document(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    state
        .collections
        .delete_document(&auth.principal, &auth.extra_grants, &collection, &id)
        .await?;
    Ok(Json(json!({ "message": format!("document '{id}' deleted") })))
}
