//! Login and refresh (§6 `/auth/login`, `/auth/refresh`).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::model::principal::{Role, User};
use crate::AppState;

/// A user with `password_hash` redacted before it reaches the wire.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            active: u.active,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

/// Logs a user in. Unknown email and wrong password produce the same
/// `Unauthorized` message (§7 identical unknown-email vs wrong-password
/// messaging) so a prober can't tell the two apart, and a failed attempt
/// is recorded against the looked-up account's lockout counter.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = LoginResponse),
        (status = 401, description = "Invalid credentials or locked account"),
    ),
    tag = "auth"
)]
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    const INVALID_CREDENTIALS: &str = "invalid email or password";

    let Some(mut user) = state.users.get_by_email(&req.email).await? else {
        return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    if user.is_locked(chrono::Utc::now()) {
        return Err(CoreError::Unauthorized("account is locked, try again later".to_string()));
    }
    if !user.active {
        return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if !state.auth_service.verify_password(&req.password, &user.password_hash)? {
        state
            .users
            .record_failed_login(
                &mut user,
                state.config.rate_limit.max_failed_logins,
                chrono::Duration::minutes(state.config.rate_limit.lockout_minutes),
            )
            .await;
        return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    state.users.record_successful_login(&mut user).await;
    let tokens = state.auth_service.generate_tokens(&user.id, &user.email, user.role)?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: user.into(),
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Exchanges a refresh token for a fresh token pair. The refresh token is
/// just another signed JWT — verification is the same `verify_token` call
/// an access token would get, not a separate persisted-session lookup.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Invalid or expired refresh token"),
    ),
    tag = "auth"
)]
pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> Result<Json<RefreshResponse>> {
    let claims = state.auth_service.verify_token(&req.refresh_token)?;
    let user = state
        .users
        .get_by_id(&claims.sub)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("invalid refresh token".to_string()))?;
    if !user.active || user.is_locked(chrono::Utc::now()) {
        return Err(CoreError::Unauthorized("invalid refresh token".to_string()));
    }

    let tokens = state.auth_service.generate_tokens(&user.id, &user.email, user.role)?;
    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}
