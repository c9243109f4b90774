//! tabvault configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main tabvault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabvaultConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Artifact store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

impl TabvaultConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.store.ttl_secs == 0 {
            return Err(Error::Config("store.ttl_secs must be greater than 0".into()));
        }
        if self.store.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "store.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Externally reachable base URL, used to build `fetch_endpoint`
    pub public_base_url: String,

    /// Allowed CORS origins (empty = any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            public_base_url: "http://localhost:8000".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

/// Which storage backend holds artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// Embedded SQLite table, survives restart
    Sqlite,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "sqlite" | "durable" => Ok(StoreBackend::Sqlite),
            other => Err(Error::Config(format!("unknown store backend '{}'", other))),
        }
    }
}

/// Artifact store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage backend
    pub backend: StoreBackend,

    /// Seconds an artifact stays retrievable after ingestion
    pub ttl_secs: u64,

    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,

    /// SQLite database file (sqlite backend only)
    pub sqlite_path: PathBuf,
}

impl StoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let base = dirs_next::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tabvault");

        Self {
            backend: StoreBackend::Memory,
            ttl_secs: 300,
            sweep_interval_secs: 60,
            sqlite_path: base.join("artifacts.db"),
        }
    }
}
