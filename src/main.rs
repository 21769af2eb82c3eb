//! AnyBase Server Binary
//!
//! This is the main entry point for running AnyBase as a standalone server.
//! For library usage, import from the `anybase` crate instead.

use anybase::access_keys::{AccessKeyRegistry, StorageAccessKeyStore};
use anybase::auth::jwt::AuthService;
use anybase::auth::users::UserStore;
use anybase::collections::CollectionService;
use anybase::config::AnyBaseConfig;
use anybase::model::principal::Role;
use anybase::rag::{HashEmbeddingProvider, RagOrchestrator};
use anybase::storage::MemoryAdapter;
use anybase::{api, audit::AccessLogWriter, AppState};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const CONFIG_FILE: &str = "anybase.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file for secrets (ANYBASE_JWT_SECRET, admin bootstrap, etc.)
    dotenvy::dotenv().ok();

    let config = AnyBaseConfig::load(Some(CONFIG_FILE))?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| config.server.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AnyBase");

    // =================================================================
    // Storage, audit trail, and the orchestration core
    // =================================================================
    let memory = Arc::new(MemoryAdapter::new().await?);
    let storage: Arc<dyn anybase::storage::StorageAdapter> = memory.clone();
    let audit = Arc::new(AccessLogWriter::new(memory, config.audit.queue_capacity));
    let collections = Arc::new(CollectionService::new(storage.clone(), audit).await?);
    tracing::info!("Collection service initialized");

    // =================================================================
    // RAG orchestrator, bound back into the collection service so
    // document mutations can trigger auto-embed jobs
    // =================================================================
    let rag = Arc::new(RagOrchestrator::new(collections.clone()));
    rag.register_provider("hash", Arc::new(HashEmbeddingProvider::new(384)));
    rag.load_persisted_configs().await?;
    collections.attach_rag_orchestrator(rag.clone());
    tracing::info!("RAG orchestrator initialized");

    // =================================================================
    // Users, auth service, access keys
    // =================================================================
    let users = Arc::new(UserStore::new(storage.clone()).await?);
    let auth_service = Arc::new(AuthService::new(
        config.jwt_secret()?,
        config.auth.access_token_expiry_secs,
        config.auth.refresh_token_expiry_secs,
    ));
    seed_admin_if_empty(&users, &auth_service).await?;
    tracing::info!("Auth service initialized");

    let access_key_store = StorageAccessKeyStore::new(storage.clone()).await?;
    let access_keys = Arc::new(AccessKeyRegistry::new(access_key_store));

    // =================================================================
    // Application state
    // =================================================================
    let state = AppState {
        config: Arc::new(config.clone()),
        collections,
        rag,
        users,
        auth_service,
        access_keys,
    };

    // =================================================================
    // OpenAPI documentation
    // =================================================================
    #[derive(OpenApi)]
    #[openapi(
        paths(
            anybase::api::handlers::auth::login,
            anybase::api::handlers::auth::refresh,
        ),
        components(schemas(
            anybase::api::handlers::auth::LoginRequest,
            anybase::api::handlers::auth::LoginResponse,
            anybase::api::handlers::auth::RefreshRequest,
            anybase::api::handlers::auth::RefreshResponse,
            anybase::api::handlers::auth::UserView,
        )),
        tags(
            (name = "auth", description = "Authentication endpoints"),
            (name = "collections", description = "Collection CRUD"),
            (name = "documents", description = "Document CRUD"),
            (name = "views", description = "Saved view CRUD and execution"),
            (name = "vectors", description = "Vector fields and similarity search"),
            (name = "rag", description = "Retrieval-augmented generation"),
            (name = "access-keys", description = "Access key lifecycle"),
        ),
        info(
            title = "AnyBase API",
            version = "0.6.0",
            description = "A multi-tenant document-and-vector backend with collections, saved views, RBAC, and RAG"
        )
    )]
    struct ApiDoc;

    // =================================================================
    // Router
    // =================================================================
    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::routes::create_router(&state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // =================================================================
    // Start server
    // =================================================================
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Bootstraps the first admin account from `ANYBASE_ADMIN_EMAIL` /
/// `ANYBASE_ADMIN_PASSWORD` when no users exist yet. There is no
/// `/auth/register` endpoint (§6) — this is the only way an admin account
/// is ever created.
async fn seed_admin_if_empty(users: &UserStore, auth_service: &AuthService) -> Result<(), Box<dyn std::error::Error>> {
    if !users.list().await?.is_empty() {
        return Ok(());
    }

    let email = std::env::var("ANYBASE_ADMIN_EMAIL").map_err(|_| "no users exist and ANYBASE_ADMIN_EMAIL is not set to seed one")?;
    let password = std::env::var("ANYBASE_ADMIN_PASSWORD")?;
    let hash = auth_service.hash_password(&password)?;
    let admin = users.create(&email, hash, "Administrator".to_string(), Role::Admin).await?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "seeded initial admin account");
    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
