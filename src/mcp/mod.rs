//! Model Context Protocol surface (§4.H, §6 `/mcp`): a JSON-RPC 2.0
//! endpoint exposing every collection and view as an MCP resource/tool
//! pair, gated by the caller's own permission set rather than a separate
//! MCP-specific grant.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json5};

use crate::auth::middleware::AuthUser;
use crate::collections::DocumentQuery;
use crate::error::CoreError;
use crate::model::document::{UpdateMode, VersionPrecondition};
use crate::model::permission::{Action, ResourceKind};
use crate::model::value::{DocumentData, Value};
use crate::model::view::ViewRuntimeOptions;
use crate::rbac::RbacEvaluator;
use crate::AppState;

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Json5>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Json5>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Json5,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Json5>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn ok(id: Json5, result: Json5) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    fn err(id: Json5, code: i64, message: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(JsonRpcError { code, message: message.into() }) }
    }
}

/// POST `/mcp`: dispatches a single JSON-RPC 2.0 call.
pub async fn handle_request(State(state): State<AppState>, AuthUser(auth): AuthUser, body: axum::body::Bytes) -> Json<JsonRpcResponse> {
    let req: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return Json(JsonRpcResponse::err(Json5::Null, PARSE_ERROR, format!("parse error: {e}"))),
    };
    let id = req.id.clone().unwrap_or(Json5::Null);

    let result = match req.method.as_str() {
        "initialize" => Ok(initialize()),
        "resources/list" => resources_list(&state, &auth).await,
        "resources/read" => resources_read(&state, &auth, req.params).await,
        "tools/list" => tools_list(&state, &auth).await,
        "tools/call" => tools_call(&state, &auth, req.params).await,
        _ => return Json(JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("method not found: {}", req.method))),
    };

    match result {
        Ok(value) => Json(JsonRpcResponse::ok(id, value)),
        Err(McpError::InvalidParams(msg)) => Json(JsonRpcResponse::err(id, INVALID_PARAMS, msg)),
        Err(McpError::Core(err)) => Json(JsonRpcResponse::err(id, INTERNAL_ERROR, err.to_string())),
    }
}

enum McpError {
    InvalidParams(String),
    Core(CoreError),
}

impl From<CoreError> for McpError {
    fn from(e: CoreError) -> Self {
        McpError::Core(e)
    }
}

fn initialize() -> Json5 {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": { "name": "anybase", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "resources": {}, "tools": {} },
    })
}

async fn resources_list(state: &AppState, auth: &crate::auth::middleware::AuthenticatedPrincipal) -> Result<Json5, McpError> {
    let collections = state.collections.list_collections(&auth.principal, &auth.extra_grants).await?;
    let views = state.collections.list_views(&auth.principal, &auth.extra_grants).await?;

    let mut resources: Vec<Json5> = collections
        .into_iter()
        .map(|c| json!({ "uri": format!("anybase://collection/{}", c.name), "name": c.name, "description": c.description }))
        .collect();
    resources.extend(
        views
            .into_iter()
            .map(|v| json!({ "uri": format!("anybase://view/{}", v.name), "name": v.name, "description": Json5::Null })),
    );

    Ok(json!({ "resources": resources }))
}

fn parse_uri(uri: &str) -> Result<(&'static str, &str), McpError> {
    if let Some(name) = uri.strip_prefix("anybase://collection/") {
        Ok(("collection", name))
    } else if let Some(name) = uri.strip_prefix("anybase://view/") {
        Ok(("view", name))
    } else {
        Err(McpError::InvalidParams(format!("unrecognized resource uri '{uri}'")))
    }
}

async fn resources_read(state: &AppState, auth: &crate::auth::middleware::AuthenticatedPrincipal, params: Option<Json5>) -> Result<Json5, McpError> {
    let uri = params
        .as_ref()
        .and_then(|p| p.get("uri"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::InvalidParams("missing 'uri' param".into()))?;
    let (kind, name) = parse_uri(uri)?;

    let rows = match kind {
        "collection" => {
            let query = DocumentQuery { filter: Default::default(), sort: None, limit: Some(20), skip: None, projection: None, include_deleted: false };
            state.collections.query_documents(&auth.principal, &auth.extra_grants, name, query).await?
        }
        _ => {
            state
                .collections
                .query_view(&auth.principal, &auth.extra_grants, name, ViewRuntimeOptions { extra_filter: None, sort: None, limit: None, skip: None })
                .await?
        }
    };

    Ok(json!({ "contents": [{ "uri": uri, "text": serde_json::to_string(&rows).unwrap_or_default() }] }))
}

async fn tools_list(state: &AppState, auth: &crate::auth::middleware::AuthenticatedPrincipal) -> Result<Json5, McpError> {
    let evaluator = RbacEvaluator::new(auth.principal.clone(), auth.extra_grants.clone());
    let collections = state.collections.list_collections(&auth.principal, &auth.extra_grants).await?;
    let views = state.collections.list_views(&auth.principal, &auth.extra_grants).await?;

    let mut tools = Vec::new();
    for c in &collections {
        if evaluator.allowed(ResourceKind::Collection, &c.name, Action::Read) {
            tools.push(json!({ "name": format!("query_{}", c.name), "description": format!("Query documents in '{}'", c.name) }));
        }
        if evaluator.allowed(ResourceKind::Collection, &c.name, Action::Write) {
            tools.push(json!({ "name": format!("insert_{}", c.name), "description": format!("Insert a document into '{}'", c.name) }));
            tools.push(json!({ "name": format!("update_{}", c.name), "description": format!("Update a document in '{}'", c.name) }));
        }
        if evaluator.allowed(ResourceKind::Collection, &c.name, Action::Delete) {
            tools.push(json!({ "name": format!("delete_{}", c.name), "description": format!("Delete a document in '{}'", c.name) }));
        }
    }
    for v in &views {
        tools.push(json!({ "name": format!("execute_view_{}", v.name), "description": format!("Execute saved view '{}'", v.name) }));
    }

    Ok(json!({ "tools": tools }))
}

async fn tools_call(state: &AppState, auth: &crate::auth::middleware::AuthenticatedPrincipal, params: Option<Json5>) -> Result<Json5, McpError> {
    let params = params.ok_or_else(|| McpError::InvalidParams("missing params".into()))?;
    let name = params.get("name").and_then(|v| v.as_str()).ok_or_else(|| McpError::InvalidParams("missing 'name'".into()))?;
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    if let Some(collection) = name.strip_prefix("query_") {
        let filter = arguments.get("filter").cloned().unwrap_or(json!({}));
        let filter = Value::from_json(filter).as_object().cloned().unwrap_or_default();
        let query = DocumentQuery { filter, sort: None, limit: Some(20), skip: None, projection: None, include_deleted: false };
        let rows = state.collections.query_documents(&auth.principal, &auth.extra_grants, collection, query).await?;
        return Ok(tool_result(&rows));
    }
    if let Some(collection) = name.strip_prefix("insert_") {
        let data: DocumentData = arguments
            .get("data")
            .and_then(|v| Value::from_json(v.clone()).as_object().cloned())
            .ok_or_else(|| McpError::InvalidParams("missing 'data' object".into()))?;
        let doc = state.collections.insert_document(&auth.principal, &auth.extra_grants, collection, data).await?;
        return Ok(tool_result(&doc));
    }
    if let Some(collection) = name.strip_prefix("update_") {
        let id = arguments.get("id").and_then(|v| v.as_str()).ok_or_else(|| McpError::InvalidParams("missing 'id'".into()))?;
        let data: DocumentData = arguments
            .get("data")
            .and_then(|v| Value::from_json(v.clone()).as_object().cloned())
            .ok_or_else(|| McpError::InvalidParams("missing 'data' object".into()))?;
        let doc = state
            .collections
            .update_document(&auth.principal, &auth.extra_grants, collection, id, data, UpdateMode::Patch, VersionPrecondition { if_version: None })
            .await?;
        return Ok(tool_result(&doc));
    }
    if let Some(collection) = name.strip_prefix("delete_") {
        let id = arguments.get("id").and_then(|v| v.as_str()).ok_or_else(|| McpError::InvalidParams("missing 'id'".into()))?;
        state.collections.delete_document(&auth.principal, &auth.extra_grants, collection, id).await?;
        return Ok(json!({ "content": [{ "type": "text", "text": format!("document '{id}' deleted") }] }));
    }
    if let Some(view) = name.strip_prefix("execute_view_") {
        let rows = state
            .collections
            .query_view(&auth.principal, &auth.extra_grants, view, ViewRuntimeOptions { extra_filter: None, sort: None, limit: None, skip: None })
            .await?;
        return Ok(tool_result(&rows));
    }

    Err(McpError::InvalidParams(format!("unknown tool '{name}'")))
}

fn tool_result<T: Serialize>(value: &T) -> Json5 {
    json!({ "content": [{ "type": "text", "text": serde_json::to_string(value).unwrap_or_default() }] })
}
