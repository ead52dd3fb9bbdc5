//! Configuration management for Brain Gym
//!
//! Loads settings from TOML file at ~/.braingym/config.toml

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Passive point award configuration
    #[serde(default)]
    pub awards: AwardConfig,

    /// Data directory (defaults to ~/.braingym)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".braingym"))
        .unwrap_or_else(|| PathBuf::from(".braingym"))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port (default: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server host (default: 127.0.0.1 - localhost only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Optional API key protecting the admin routes
    /// Required in Authorization header if set: "Authorization: Bearer <key>"
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            host: default_host(),
            api_key: None,
        }
    }
}

/// Passive award loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardConfig {
    /// Milliseconds between award ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Smallest award per tick (inclusive)
    #[serde(default = "default_min_points")]
    pub min_points: i64,

    /// Largest award per tick (inclusive)
    #[serde(default = "default_max_points")]
    pub max_points: i64,
}

/// Longest accepted award interval (one day)
pub const MAX_INTERVAL_MS: u64 = 86_400_000;

fn default_interval_ms() -> u64 {
    15_000
}

fn default_min_points() -> i64 {
    40
}

fn default_max_points() -> i64 {
    79
}

impl Default for AwardConfig {
    fn default() -> Self {
        AwardConfig {
            interval_ms: default_interval_ms(),
            min_points: default_min_points(),
            max_points: default_max_points(),
        }
    }
}

impl AwardConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject settings the award loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(CoreError::Config(
                "awards.interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.interval_ms > MAX_INTERVAL_MS {
            return Err(CoreError::Config(format!(
                "awards.interval_ms ({}) exceeds the maximum of {}",
                self.interval_ms, MAX_INTERVAL_MS
            )));
        }
        if self.min_points < 0 {
            return Err(CoreError::Config(
                "awards.min_points must not be negative".to_string(),
            ));
        }
        if self.min_points > self.max_points {
            return Err(CoreError::Config(format!(
                "awards.min_points ({}) exceeds awards.max_points ({})",
                self.min_points, self.max_points
            )));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            awards: AwardConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_path(path.as_ref());

        if !expanded_path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                expanded_path.display()
            )));
        }

        let content = std::fs::read_to_string(&expanded_path)?;
        let config: Config = toml::from_str(&content)?;
        config.awards.validate()?;

        Ok(config)
    }

    /// Get the data directory, expanding ~ if present
    pub fn data_dir(&self) -> PathBuf {
        expand_path(&self.data_dir)
    }

    /// Get the server socket address
    pub fn server_addr(&self) -> SocketAddr {
        use std::net::ToSocketAddrs;

        format!("{}:{}", self.server.host, self.server.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], self.server.port)))
    }

    /// Apply environment variable overrides (server options only)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("BRAINGYM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BRAINGYM_SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid BRAINGYM_SERVER_PORT: {}", port),
            }
        }
        if let Ok(key) = std::env::var("BRAINGYM_SERVER_API_KEY") {
            self.server.api_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Ok(data_dir) = std::env::var("BRAINGYM_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }
    }

    /// Create a default configuration file at the given path
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let content = r#"# Brain Gym Configuration

[server]
# Port to listen on (default: 5000)
port = 5000

# Host to bind to
# "127.0.0.1" = localhost only
# "0.0.0.0" = all interfaces (set api_key to protect the admin routes!)
host = "127.0.0.1"

# Optional API key for the admin routes
# If set, admin clients must send: Authorization: Bearer <api_key>
# api_key = "your-secret-key"

[awards]
# Passive points: every interval_ms an active player earns a random
# amount between min_points and max_points (both inclusive)
interval_ms = 15000
min_points = 40
max_points = 79
"#;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Expand ~ to home directory in paths
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
