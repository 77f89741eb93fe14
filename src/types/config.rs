//! Configuration structures.
//!
//! Configuration is loaded once at startup from environment variables,
//! with serde defaults so a config file can provide the same shape.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Graph store connection settings.
    #[serde(default)]
    pub graph: GraphStoreConfig,

    /// Key-value store connection settings.
    #[serde(default)]
    pub kv: KvStoreConfig,

    /// Structured logger settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Shared connection lifecycle settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// Graph store connection settings.
///
/// When `url` is present it takes precedence over the discrete fields and
/// is parsed best-effort (see `store::parser`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            url: None,
        }
    }
}

/// Key-value store connection settings. Same precedence rules as the
/// graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvStoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            url: None,
        }
    }
}

/// Structured logger settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable the durable file sink. Off by default for stdio servers;
    /// forced on in development mode.
    pub file_enabled: bool,

    /// Directory for the log file. Defaults to a directory under the
    /// system temp dir.
    pub dir: Option<std::path::PathBuf>,

    /// Development mode: enables DEBUG records and the file sink.
    pub development: bool,
}

/// Connection lifecycle settings shared by every managed connection.
///
/// The retry budget itself is fixed (`store::connection::MAX_RETRIES`);
/// only the inter-retry delay is configurable so tests can collapse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Fixed delay between connect attempts.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(5000),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable values fall back to defaults; this never
    /// fails, matching the best-effort posture of the rest of startup.
    pub fn from_env() -> Self {
        let development = env_var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);
        let file_enabled = env_var("ENABLE_FILE_LOGGING")
            .map(|v| v == "true")
            .unwrap_or(false)
            || development;

        Self {
            graph: GraphStoreConfig {
                host: env_var("GRAPH_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: env_var("GRAPH_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(6379),
                username: env_var("GRAPH_USERNAME"),
                password: env_var("GRAPH_PASSWORD"),
                url: env_var("GRAPH_URL"),
            },
            kv: KvStoreConfig {
                host: env_var("KV_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: env_var("KV_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(6379),
                username: env_var("KV_USERNAME"),
                password: env_var("KV_PASSWORD"),
                url: env_var("KV_URL"),
            },
            logging: LoggingConfig {
                file_enabled,
                dir: env_var("LOG_DIR").map(std::path::PathBuf::from),
                development,
            },
            connection: ConnectionConfig::default(),
        }
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}
