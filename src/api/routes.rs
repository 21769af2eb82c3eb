use crate::auth::middleware::auth_middleware;
use crate::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

pub fn create_router(state: &AppState) -> Router<AppState> {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(crate::api::handlers::auth::login))
        .route("/auth/refresh", post(crate::api::handlers::auth::refresh));

    // Protected routes: the auth middleware resolves a `Principal` into
    // request extensions, which the `AuthUser` extractor in each handler
    // then pulls back out.
    let protected_routes = Router::new()
        .route(
            "/collections",
            post(crate::api::handlers::collections::create_collection).get(crate::api::handlers::collections::list_collections),
        )
        .route(
            "/collections/{name}",
            get(crate::api::handlers::collections::get_collection)
                .put(crate::api::handlers::collections::update_collection)
                .delete(crate::api::handlers::collections::delete_collection),
        )
        .route(
            "/data/{collection}",
            post(crate::api::handlers::documents::insert_document).get(crate::api::handlers::documents::list_documents),
        )
        .route(
            "/data/{collection}/{id}",
            get(crate::api::handlers::documents::get_document)
                .put(crate::api::handlers::documents::update_document)
                .delete(crate::api::handlers::documents::delete_document),
        )
        .route(
            "/views",
            post(crate::api::handlers::views::create_view).get(crate::api::handlers::views::list_views),
        )
        .route(
            "/views/{name}",
            get(crate::api::handlers::views::get_view)
                .put(crate::api::handlers::views::update_view)
                .delete(crate::api::handlers::views::delete_view),
        )
        .route("/views/{name}/query", post(crate::api::handlers::views::query_view))
        .route(
            "/collections/{name}/vector-fields",
            post(crate::api::handlers::vectors::add_vector_field).get(crate::api::handlers::vectors::list_vector_fields),
        )
        .route(
            "/collections/{name}/vector-fields/{field}",
            delete(crate::api::handlers::vectors::remove_vector_field),
        )
        .route("/collections/{name}/vector-search", post(crate::api::handlers::vectors::vector_search))
        .route("/collections/{name}/hybrid-search", post(crate::api::handlers::vectors::hybrid_search))
        .route(
            "/collections/{name}/rag-config",
            put(crate::api::handlers::rag::set_rag_config),
        )
        .route(
            "/collections/{name}/rag-config/{field}",
            get(crate::api::handlers::rag::get_rag_config),
        )
        .route(
            "/collections/{name}/embedding-jobs",
            post(crate::api::handlers::rag::submit_embedding_job).get(crate::api::handlers::rag::list_embedding_jobs),
        )
        .route("/embedding-jobs/{id}", get(crate::api::handlers::rag::get_embedding_job))
        .route("/embedding-jobs/{id}/cancel", post(crate::api::handlers::rag::cancel_embedding_job))
        .route("/collections/{name}/rag-query", post(crate::api::handlers::rag::query_rag))
        .route(
            "/admin/access-keys",
            post(crate::api::handlers::access_keys::create_access_key).get(crate::api::handlers::access_keys::list_access_keys),
        )
        .route(
            "/admin/access-keys/{id}",
            get(crate::api::handlers::access_keys::get_access_key)
                .put(crate::api::handlers::access_keys::update_access_key)
                .delete(crate::api::handlers::access_keys::delete_access_key),
        )
        .route("/admin/access-keys/{id}/revoke", post(crate::api::handlers::access_keys::revoke_access_key))
        .route(
            "/admin/access-keys/{id}/regenerate",
            post(crate::api::handlers::access_keys::regenerate_access_key),
        )
        .route("/mcp", post(crate::mcp::handle_request))
        .layer(middleware::from_fn_with_state(state.auth_context(), auth_middleware));

    // Merge all routes
    Router::new().merge(public_routes).merge(protected_routes)
}
