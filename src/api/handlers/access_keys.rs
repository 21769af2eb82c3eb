//! Access-key management (§6 `/admin/access-keys`, `/admin/access-keys/{id}/regenerate`).

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::error::Result;
use crate::model::permission::{PermissionSet, PermissionString};
use crate::AppState;

/// An access key with `key_hash` redacted before it reaches the wire.
#[derive(Debug, Serialize)]
pub struct AccessKeyView {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
    pub key_prefix: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl From<crate::model::principal::AccessKeyRecord> for AccessKeyView {
    fn from(r: crate::model::principal::AccessKeyRecord) -> Self {
        Self {
            id: r.id,
            owner_user_id: r.owner_user_id,
            name: r.name,
            description: r.description,
            permissions: r.permissions,
            key_prefix: r.key_prefix,
            created_at: r.created_at,
            expires_at: r.expires_at,
            last_used_at: r.last_used_at,
            revoked: r.revoked,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccessKeyRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionString>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateAccessKeyResponse {
    pub key: String,
    #[serde(flatten)]
    pub record: AccessKeyView,
}

#[utoipa::path(
    post,
    path = "/admin/access-keys",
    responses((status = 200, description = "Access key created; plaintext shown exactly once")),
    tag = "access-keys"
)]
pub async fn create_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Json(req): Json<CreateAccessKeyRequest>,
) -> Result<Json<CreateAccessKeyResponse>> {
    let issued = state
        .access_keys
        .issue(
            auth.principal.owner_user_id(),
            req.name,
            req.description,
            PermissionSet(req.permissions),
            req.expires_at,
        )
        .await?;
    Ok(Json(CreateAccessKeyResponse {
        key: issued.plaintext,
        record: issued.record.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/admin/access-keys",
    responses((status = 200, description = "Access keys owned by the caller")),
    tag = "access-keys"
)]
pub async fn list_access_keys(State(state): State<AppState>, AuthUser(auth): AuthUser) -> Result<Json<Vec<AccessKeyView>>> {
    let records = state.access_keys.list_for_owner(auth.principal.owner_user_id()).await?;
    Ok(Json(records.into_iter().map(AccessKeyView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/access-keys/{id}",
    responses((status = 200, description = "Access key metadata")),
    tag = "access-keys"
)]
pub async fn get_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<AccessKeyView>> {
    let record = state.access_keys.get(auth.principal.owner_user_id(), &id).await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccessKeyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<PermissionString>>,
}

#[utoipa::path(
    put,
    path = "/admin/access-keys/{id}",
    responses((status = 200, description = "Updated access key metadata")),
    tag = "access-keys"
)]
pub async fn update_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateAccessKeyRequest>,
) -> Result<Json<AccessKeyView>> {
    let record = state
        .access_keys
        .update(auth.principal.owner_user_id(), &id, req.name, req.description, req.permissions.map(PermissionSet))
        .await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/admin/access-keys/{id}/revoke",
    responses((status = 200, description = "Access key revoked")),
    tag = "access-keys"
)]
pub async fn revoke_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.access_keys.revoke(auth.principal.owner_user_id(), &id).await?;
    Ok(Json(json!({ "message": format!("access key '{id}' revoked") })))
}

#[utoipa::path(
    delete,
    path = "/admin/access-keys/{id}",
    responses((status = 200, description = "Access key deleted")),
    tag = "access-keys"
)]
pub async fn delete_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.access_keys.delete(auth.principal.owner_user_id(), &id).await?;
    Ok(Json(json!({ "message": format!("access key '{id}' deleted") })))
}

#[derive(Debug, Serialize)]
pub struct RegenerateAccessKeyResponse {
    pub key: String,
}

#[utoipa::path(
    post,
    path = "/admin/access-keys/{id}/regenerate",
    responses((status = 200, description = "New plaintext key issued")),
    tag = "access-keys"
)]
pub async fn regenerate_access_key(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RegenerateAccessKeyResponse>> {
    let issued = state.access_keys.regenerate(auth.principal.owner_user_id(), &id).await?;
    Ok(Json(RegenerateAccessKeyResponse { key: issued.plaintext }))
}
