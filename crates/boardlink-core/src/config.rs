//! Server configuration.
//!
//! Defaults plus environment-variable overrides, so a bare `boardlink serve`
//! works out of the box and deployments tune via env.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable names.
pub mod env_vars {
    pub const BIND_ADDR: &str = "BOARDLINK_BIND_ADDR";
    pub const DATA_DIR: &str = "BOARDLINK_DATA_DIR";
    pub const REPLICA_PATHS: &str = "BOARDLINK_REPLICA_PATHS";
    pub const REGISTRATION_KEY: &str = "BOARDLINK_REGISTRATION_KEY";
    pub const SESSION_TTL_SECS: &str = "BOARDLINK_SESSION_TTL_SECS";
    pub const MIRROR_TIMEOUT_MS: &str = "BOARDLINK_MIRROR_TIMEOUT_MS";
}

/// Default values.
pub mod defaults {
    pub const BIND_ADDR: &str = "0.0.0.0:5000";
    pub const DATA_DIR: &str = "data";
    pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;
    pub const MIRROR_TIMEOUT_MS: u64 = 2_000;
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Directory holding the primary store (`dispatch.redb`).
    pub data_dir: String,
    /// Paths of secondary replica stores. Empty means mirroring is off.
    pub replica_paths: Vec<String>,
    /// Shared key gating operator self-registration.
    pub registration_key: String,
    /// Operator session lifetime in seconds.
    pub session_ttl_secs: i64,
    /// Per-secondary mirroring deadline in milliseconds.
    pub mirror_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR.to_string(),
            data_dir: defaults::DATA_DIR.to_string(),
            replica_paths: Vec::new(),
            registration_key: String::new(),
            session_ttl_secs: defaults::SESSION_TTL_SECS,
            mirror_timeout_ms: defaults::MIRROR_TIMEOUT_MS,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from defaults overridden by environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var(env_vars::BIND_ADDR) {
            config.bind_addr = addr;
        }
        if let Ok(dir) = std::env::var(env_vars::DATA_DIR) {
            config.data_dir = dir;
        }
        if let Ok(paths) = std::env::var(env_vars::REPLICA_PATHS) {
            config.replica_paths = paths
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(key) = std::env::var(env_vars::REGISTRATION_KEY) {
            config.registration_key = key;
        }
        if let Ok(ttl) = std::env::var(env_vars::SESSION_TTL_SECS) {
            config.session_ttl_secs = ttl
                .parse()
                .map_err(|_| Error::config(format!("invalid {}: {}", env_vars::SESSION_TTL_SECS, ttl)))?;
        }
        if let Ok(ms) = std::env::var(env_vars::MIRROR_TIMEOUT_MS) {
            config.mirror_timeout_ms = ms
                .parse()
                .map_err(|_| Error::config(format!("invalid {}: {}", env_vars::MIRROR_TIMEOUT_MS, ms)))?;
        }

        Ok(config)
    }

    /// Path of the primary store database file.
    pub fn primary_db_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("dispatch.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert!(config.replica_paths.is_empty());
        assert_eq!(config.mirror_timeout_ms, 2_000);
    }

    #[test]
    fn test_primary_db_path() {
        let config = ServerConfig {
            data_dir: "/var/lib/boardlink".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.primary_db_path(),
            std::path::PathBuf::from("/var/lib/boardlink/dispatch.redb")
        );
    }
}
