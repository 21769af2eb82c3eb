//! Core error type.
//!
//! `CoreError` is the single error surface every component in `anybase`
//! returns. Storage-adapter and provider errors are mapped onto it exactly
//! once, at the boundary where they're first observed — nothing downstream
//! re-wraps an already-mapped error, and no raw adapter error string crosses
//! the service boundary (see `CoreError::Internal`, which intentionally
//! swallows the detail it was built from).

use serde::Serialize;

/// Stable error kinds surfaced to callers of the core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input or schema violation. Carries a field path when known.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No valid principal could be resolved from the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A principal was resolved but lacks the permission for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource absent, or present but hidden from this principal.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate name or a concurrent version mismatch.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Resource is referenced by another resource and can't be removed.
    #[error("in use: {0}")]
    InUse(String),

    /// Storage was transiently unavailable after retries were exhausted.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The operation exceeded its time budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Anything else. Never built directly from a raw adapter error string;
    /// callers pass a short, actionable description instead.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Specialized result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Machine-readable error code, stable across releases.
impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::BadRequest(_) => "bad_request",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::InUse(_) => "in_use",
            CoreError::Unavailable(_) => "unavailable",
            CoreError::Timeout(_) => "timeout",
            CoreError::Internal(_) => "internal",
        }
    }
}

/// The uniform wire error shape from §6: `{"error": string, "code": string}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        ErrorBody {
            error: err.to_string(),
            code: err.code(),
        }
    }
}

impl axum::response::IntoResponse for CoreError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::InUse(_) => StatusCode::CONFLICT,
            CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody::from(&self);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(CoreError::BadRequest("x".into()).code(), "bad_request");
        assert_eq!(CoreError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(CoreError::InUse("x".into()).code(), "in_use");
    }

    #[test]
    fn error_body_never_echoes_variant_name_only() {
        let err = CoreError::NotFound("collection 'widgets'".into());
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, "not_found");
        assert!(body.error.contains("widgets"));
    }
}
