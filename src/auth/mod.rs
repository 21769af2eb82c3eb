//! Authentication: password/JWT login for `User` principals, and the
//! dual JWT/API-key middleware that resolves every request to a
//! `Principal` before it reaches a handler (§6).
//!
//! - [`auth::jwt`](crate::auth::jwt) - password hashing and JWT issuance/verification
//! - [`auth::users`](crate::auth::users) - `User` persistence
//! - [`auth::middleware`](crate::auth::middleware) - the `auth_middleware` axum layer and `AuthUser` extractor

/// JWT token generation, validation, and password hashing services.
pub mod jwt;
/// Authentication middleware and extractors for protected routes.
pub mod middleware;
/// `User` persistence backed by the metadata-as-documents pattern.
pub mod users;
