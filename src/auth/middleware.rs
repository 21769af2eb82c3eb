//! Dual-scheme authentication (§6 "Authentication wire format"): a request
//! presents either a JWT bearer token or an `X-Api-Key` header, never both,
//! and either resolves to a `Principal` the rest of the stack treats
//! uniformly.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::access_keys::{AccessKeyRegistry, StorageAccessKeyStore};
use crate::auth::jwt::AuthService;
use crate::auth::users::UserStore;
use crate::model::permission::PermissionSet;
use crate::model::principal::Principal;

const API_KEY_HEADER: &str = "x-api-key";

/// Everything a request needs to resolve and authorize a principal,
/// threaded through as axum `State`.
#[derive(Clone)]
pub struct AuthContext {
    pub auth_service: Arc<AuthService>,
    pub users: Arc<UserStore>,
    pub access_keys: Arc<AccessKeyRegistry<StorageAccessKeyStore>>,
}

/// The resolved identity for the current request, plus the per-user grants
/// (empty for an AccessKey principal, since its permission set is already
/// final — see `rbac::effective_permissions`).
#[derive(Clone)]
pub struct AuthenticatedPrincipal {
    pub principal: Principal,
    pub extra_grants: PermissionSet,
}

pub async fn auth_middleware(State(ctx): State<AuthContext>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers();
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    let api_key = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok());

    let resolved = match (bearer, api_key) {
        (Some(token), None) => resolve_jwt(&ctx, token).await?,
        (None, Some(key)) => resolve_api_key(&ctx, key).await?,
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    req.extensions_mut().insert(resolved);
    Ok(next.run(req).await)
}

async fn resolve_jwt(ctx: &AuthContext, token: &str) -> Result<AuthenticatedPrincipal, StatusCode> {
    let claims = ctx.auth_service.verify_token(token).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let user = ctx
        .users
        .get_by_id(&claims.sub)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if !user.active || user.is_locked(chrono::Utc::now()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let extra_grants = user.extra_grants.clone();
    Ok(AuthenticatedPrincipal {
        principal: Principal::User(Box::new(user)),
        extra_grants,
    })
}

async fn resolve_api_key(ctx: &AuthContext, plaintext: &str) -> Result<AuthenticatedPrincipal, StatusCode> {
    let record = ctx
        .access_keys
        .verify(plaintext)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(AuthenticatedPrincipal {
        principal: Principal::AccessKey(Box::new(record)),
        extra_grants: PermissionSet::default(),
    })
}

/// Extractor pulling the resolved principal back out of request
/// extensions, for use in handlers.
pub struct AuthUser(pub AuthenticatedPrincipal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .map(AuthUser)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
