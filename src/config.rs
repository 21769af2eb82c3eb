//! Configuration (§5, §6 ambient concerns), loaded from `anybase.toml` plus
//! environment overrides the same way the original `ares.toml` loader
//! layered environment variables over a base file, but without its
//! hot-reload machinery — nothing in this crate's component set watches
//! configuration for live changes.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Root configuration structure, loaded from `anybase.toml` (or the path
/// given by `ANYBASE_CONFIG`) with `ANYBASE__*` environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyBaseConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

/// JWT issuance settings (§6 "Authentication wire format").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the environment variable carrying the JWT signing secret.
    /// The secret itself is never written into the config file.
    pub jwt_secret_env: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry_secs: i64,
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry_secs: i64,
}

fn default_access_expiry() -> i64 {
    900
}

fn default_refresh_expiry() -> i64 {
    604_800
}

/// Login rate-limiting (§7 "Rate-limit: after N consecutive failed
/// logins...").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_failed_logins")]
    pub max_failed_logins: u32,
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
}

fn default_max_failed_logins() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    15
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_failed_logins: default_max_failed_logins(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

/// Access-log writer tuning (Component G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_capacity")]
    pub queue_capacity: usize,
}

fn default_audit_capacity() -> usize {
    4096
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_audit_capacity(),
        }
    }
}

impl AnyBaseConfig {
    /// Loads configuration from `path` (falling back to `anybase.toml` in
    /// the working directory), layering `ANYBASE__SERVER__PORT`-style
    /// environment overrides on top. Call `dotenvy::dotenv()` before this
    /// if secrets live in a `.env` file.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let path = path.unwrap_or("anybase.toml");
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ANYBASE").separator("__"));

        let raw = builder
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to load configuration: {e}")))?;

        raw.try_deserialize()
            .map_err(|e| CoreError::Internal(format!("malformed configuration: {e}")))
    }

    /// Resolves the JWT secret from the environment variable named by
    /// `auth.jwt_secret_env`.
    pub fn jwt_secret(&self) -> Result<String> {
        std::env::var(&self.auth.jwt_secret_env)
            .map_err(|_| CoreError::Internal(format!("environment variable '{}' is not set", self.auth.jwt_secret_env)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn rate_limit_defaults_match_spec() {
        let cfg = RateLimitConfig::default();
        assert_eq!(cfg.max_failed_logins, 5);
        assert_eq!(cfg.lockout_minutes, 15);
    }
}
