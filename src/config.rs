//! Application configuration: environment variables first, with an
//! optional `config.json` overlay, grounded in the teacher's
//! `AppConfig::load` (file-then-default) but driven primarily by env
//! vars per spec.md §6.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Shared secret used to sign/verify `command` and `lpr_settings` frames.
    pub hmac_secret_key: String,
    pub client_cert_path: String,
    pub client_key_path: String,
    pub ca_cert_path: String,

    pub database_url: String,
    pub blob_store_root: String,
    pub http_bind_addr: String,

    pub max_frame_bytes: usize,
    pub auth_timeout_ms: u64,
    pub dial_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub shutdown_deadline_ms: u64,

    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hmac_secret_key: "dev-only-insecure-secret".to_string(),
            client_cert_path: "certs/client.pem".to_string(),
            client_key_path: "certs/client.key".to_string(),
            ca_cert_path: "certs/ca.pem".to_string(),

            database_url: "sqlite://gateway.db".to_string(),
            blob_store_root: "./blobs".to_string(),
            http_bind_addr: "0.0.0.0:8080".to_string(),

            max_frame_bytes: 16 * 1024 * 1024,
            auth_timeout_ms: 30_000,
            dial_timeout_ms: 15_000,
            write_timeout_ms: 10_000,
            shutdown_deadline_ms: 10_000,

            backoff_initial_ms: 1_000,
            backoff_max_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Load configuration: start from defaults, overlay `config.json` if
    /// `GATEWAY_CONFIG` (or the default path) exists, then overlay
    /// environment variables — env vars win, matching spec.md §6's list
    /// as the canonical configuration surface.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file().unwrap_or_else(|| {
            tracing::warn!("no config.json overlay found, using defaults");
            AppConfig::default()
        });

        if let Ok(v) = std::env::var("HMAC_SECRET_KEY") {
            config.hmac_secret_key = v;
        }
        if let Ok(v) = std::env::var("CLIENT_CERT_PATH") {
            config.client_cert_path = v;
        }
        if let Ok(v) = std::env::var("CLIENT_KEY_PATH") {
            config.client_key_path = v;
        }
        if let Ok(v) = std::env::var("CA_CERT_PATH") {
            config.ca_cert_path = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            config.database_url = v;
        }
        if let Ok(v) = std::env::var("BLOB_STORE_ROOT") {
            config.blob_store_root = v;
        }
        if let Ok(v) = std::env::var("HTTP_BIND_ADDR") {
            config.http_bind_addr = v;
        }

        config.validate()?;
        Ok(config)
    }

    fn load_file() -> Option<Self> {
        let path = std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config.json".to_string());
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("failed to parse {path}: {e}, ignoring overlay");
                None
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.hmac_secret_key.is_empty() {
            anyhow::bail!("HMAC_SECRET_KEY must not be empty");
        }
        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let as_str = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, as_str).context("write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.backoff_initial_ms < config.backoff_max_ms);
    }

    #[test]
    fn empty_secret_fails_validation() {
        let mut config = AppConfig::default();
        config.hmac_secret_key.clear();
        assert!(config.validate().is_err());
    }
}
