//! JWT issuance/verification and password hashing for `User` principals.
//! Access-key issuance lives in `crate::access_keys` — this service only
//! concerns the password-login path.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::error::{CoreError, Result};
use crate::model::principal::{Claims, Role};

/// A pair of issued tokens returned from login/refresh.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Authentication service for JWT token management and password hashing.
///
/// Provides secure password hashing using Argon2id and JWT token
/// generation/verification using HS256.
pub struct AuthService {
    jwt_secret: String,
    access_expiry: i64,
    refresh_expiry: i64,
}

impl AuthService {
    /// * `jwt_secret` - Secret key for signing JWTs (should be at least 32 chars)
    /// * `access_expiry` - Access token validity in seconds
    /// * `refresh_expiry` - Refresh token validity in seconds
    pub fn new(jwt_secret: String, access_expiry: i64, refresh_expiry: i64) -> Self {
        Self {
            jwt_secret,
            access_expiry,
            refresh_expiry,
        }
    }

    /// Hashes a password using Argon2id. Returns a PHC-formatted hash string.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CoreError::Internal(format!("failed to hash password: {e}")))
    }

    /// Verifies a password against an Argon2 hash.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| CoreError::Internal(format!("invalid password hash: {e}")))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Generates access and refresh tokens for a user.
    pub fn generate_tokens(&self, user_id: &str, email: &str, role: Role) -> Result<TokenResponse> {
        let access_token = self.generate_token(user_id, email, role, self.access_expiry)?;
        let refresh_token = self.generate_token(user_id, email, role, self.refresh_expiry)?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            expires_in: self.access_expiry,
        })
    }

    fn generate_token(&self, user_id: &str, email: &str, role: Role, expiry_secs: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            exp: (Utc::now() + Duration::seconds(expiry_secs)).timestamp() as usize,
            iat: Utc::now().timestamp() as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| CoreError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verifies a JWT token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| CoreError::Unauthorized(format!("invalid token: {e}")))
    }

    /// Hashes a refresh token using SHA-256 for storage (the plaintext is
    /// never persisted).
    pub fn hash_token(&self, token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> AuthService {
        AuthService::new(
            "test-secret-key-that-is-at-least-32-chars".to_string(),
            900,
            604800,
        )
    }

    #[test]
    fn password_hash_round_trips() {
        let service = create_test_service();
        let hash = service.hash_password("test_password_123").unwrap();
        assert_ne!(hash, "test_password_123");
        assert!(hash.starts_with("$argon2"));
        assert!(service.verify_password("test_password_123", &hash).unwrap());
        assert!(!service.verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn token_round_trips_with_role() {
        let service = create_test_service();
        let tokens = service
            .generate_tokens("user-123", "test@example.com", Role::Developer)
            .unwrap();
        let claims = service.verify_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, Role::Developer);
        assert_eq!(tokens.expires_in, 900);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let service1 = AuthService::new("secret-one-that-is-32-chars-long".into(), 900, 604800);
        let service2 = AuthService::new("secret-two-that-is-32-chars-long".into(), 900, 604800);

        let tokens = service1
            .generate_tokens("user-789", "test@example.com", Role::Regular)
            .unwrap();
        assert!(service2.verify_token(&tokens.access_token).is_err());
    }

    #[test]
    fn hash_token_is_deterministic_and_distinct_per_input() {
        let service = create_test_service();
        let hash1 = service.hash_token("token-a");
        let hash2 = service.hash_token("token-a");
        let hash3 = service.hash_token("token-b");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }
}
