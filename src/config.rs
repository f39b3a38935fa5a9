//! Runtime configuration for the relay host.
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! command-line flags, each layer overriding the previous one.
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CAPACITY: usize = 2000;
pub const DEFAULT_PORT: u16 = 5080;
pub const DEFAULT_LOG_FILTER: &str = "info,log_relay=debug";
pub const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("capacity must be at least 1")]
    ZeroCapacity,

    #[error("invalid bind address: {0}")]
    InvalidBind(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Maximum number of log entries kept in memory.
    pub capacity: usize,
    /// `EnvFilter` directives for the console, the log file and the buffer.
    pub log_filter: String,
    /// Directory for the daily rolling log file; `null` turns the file off.
    pub log_dir: Option<PathBuf>,
    /// Whether to answer cross-origin requests from any origin.
    pub cors: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            cors: true,
        }
    }
}

impl RelayConfig {
    /// Loads a config file, filling missing keys with defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Checks the values that cannot be fixed up at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
