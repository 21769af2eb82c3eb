//! HTTP API handlers and routes.
//!
//! This module provides the REST API layer for AnyBase, built on the Axum
//! web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Authentication
//! - `POST /auth/login` - Log in, receive access/refresh JWTs
//! - `POST /auth/refresh` - Exchange a refresh token for a new pair
//!
//! ## Collections
//! - `POST /collections`, `GET /collections` - Create / list collections
//! - `GET /collections/{name}`, `PUT /collections/{name}`, `DELETE /collections/{name}`
//!
//! ## Documents
//! - `POST /data/{collection}`, `GET /data/{collection}` - Insert / query
//! - `GET /data/{collection}/{id}`, `PUT /data/{collection}/{id}`, `DELETE /data/{collection}/{id}`
//!
//! ## Saved views
//! - `POST /views`, `GET /views`, `GET|PUT|DELETE /views/{name}`, `POST /views/{name}/query`
//!
//! ## Vector search
//! - `POST|GET /collections/{name}/vector-fields`, `DELETE .../{field}`
//! - `POST /collections/{name}/vector-search`, `POST /collections/{name}/hybrid-search`
//!
//! ## Retrieval-augmented generation
//! - `PUT|GET /collections/{name}/rag-config`
//! - `POST|GET /collections/{name}/embedding-jobs`, `GET|POST /embedding-jobs/{id}[/cancel]`
//! - `POST /collections/{name}/rag-query`
//!
//! ## Access keys
//! - `POST|GET /admin/access-keys`, `GET|PUT|DELETE /admin/access-keys/{id}`
//! - `POST /admin/access-keys/{id}/revoke`, `POST /admin/access-keys/{id}/regenerate`
//!
//! ## Model Context Protocol
//! - `POST /mcp` - JSON-RPC 2.0 surface (see [`crate::mcp`])
//!
//! # Authentication
//!
//! Every protected endpoint requires exactly one of:
//! ```text
//! Authorization: Bearer <jwt>
//! X-Api-Key: <plaintext access key>
//! ```
//!
//! # OpenAPI Documentation
//!
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
