use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Process-wide configuration, loaded once at startup.
///
/// Secrets can be overridden from the environment so config files checked
/// into deployments never need to carry them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Shared secret for the service signature gate.
    pub signature_key: String,

    /// Symmetric signing key for bearer tokens.
    pub jwt_secret: String,

    #[serde(default = "default_jwt_ttl_minutes")]
    pub jwt_ttl_minutes: i64,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Upper bound on how long one transactional unit of work may run.
    #[serde(default = "default_tx_deadline_secs")]
    pub tx_deadline_secs: u64,
}

fn default_port() -> u16 {
    8080
}
fn default_db_max_connections() -> u32 {
    25
}
fn default_jwt_ttl_minutes() -> i64 {
    15
}
fn default_max_requests() -> u32 {
    20
}
fn default_window_secs() -> u64 {
    1
}
fn default_tx_deadline_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: AppConfig = serde_json::from_str(&raw).context("parsing JSON")?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(key) = std::env::var("SIGNATURE_KEY") {
            self.signature_key = key;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.jwt_secret = secret;
        }
    }
}
