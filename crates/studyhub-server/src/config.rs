//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use studyhub_shared::constants::{DEFAULT_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// Lifetime of issued bearer tokens, in seconds. At most ten years.
    /// Env: `TOKEN_TTL_SECS`
    /// Default: `86400`
    pub token_ttl_secs: i64,

    /// Whether new accounts may be created.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Allow cross-origin requests from any origin (browser frontend on
    /// another port).
    /// Env: `CORS_ALLOW_ANY` (true/false)
    /// Default: `true`
    pub cors_allow_any: bool,

    /// Sustained requests per second per client IP on the login and
    /// registration endpoints.
    /// Env: `AUTH_RATE_PER_SEC`
    /// Default: `1.0`
    pub auth_rate_per_sec: f64,

    /// Burst allowance for the same endpoints.
    /// Env: `AUTH_RATE_BURST`
    /// Default: `10`
    pub auth_rate_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8000).into(),
            database_path: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            registration_open: true,
            cors_allow_any: true,
            auth_rate_per_sec: 1.0,
            auth_rate_burst: 10.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = var("TOKEN_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 && n <= MAX_TOKEN_TTL_SECS => config.token_ttl_secs = n,
                _ => tracing::warn!(value = %val, "Invalid TOKEN_TTL_SECS, using default"),
            }
        }

        if let Some(val) = var("REGISTRATION_OPEN") {
            config.registration_open = flag(&val);
        }

        if let Some(val) = var("CORS_ALLOW_ANY") {
            config.cors_allow_any = flag(&val);
        }

        if let Some(val) = var("AUTH_RATE_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.auth_rate_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid AUTH_RATE_PER_SEC, using default"),
            }
        }

        if let Some(val) = var("AUTH_RATE_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.auth_rate_burst = n,
                _ => tracing::warn!(value = %val, "Invalid AUTH_RATE_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_secs)
    }
}

fn flag(val: &str) -> bool {
    val != "false" && val != "0"
}
