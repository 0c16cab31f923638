//! Configuration module for the WRH backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Which key-value backend holds the per-user records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StorageBackend::Sqlite),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Key-value backend
    pub storage: StorageBackend,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Total size budget for stored keys and values, in bytes
    pub storage_quota_bytes: Option<usize>,
    /// Index the demo catalogue at startup
    pub seed_demo: bool,
    /// Server sessions unused this long are closed
    pub session_idle_timeout: Duration,
    pub max_sessions: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("WRH_API_PSK").ok().filter(|s| !s.is_empty());

        let storage = match env::var("WRH_STORAGE") {
            Ok(value) => StorageBackend::parse(&value).ok_or_else(|| {
                AppError::Validation(format!(
                    "Invalid WRH_STORAGE '{}': expected 'sqlite' or 'memory'",
                    value
                ))
            })?,
            Err(_) => StorageBackend::Sqlite,
        };

        let db_path = env::var("WRH_DB_PATH")
            .unwrap_or_else(|_| "./data/wrh.sqlite".to_string())
            .into();

        let index_path = env::var("WRH_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let bind_addr_raw =
            env::var("WRH_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|_| {
            AppError::Validation(format!("Invalid WRH_BIND_ADDR format: {}", bind_addr_raw))
        })?;

        let log_level = env::var("WRH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("WRH_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let storage_quota_bytes = match env::var("WRH_STORAGE_QUOTA_BYTES") {
            Ok(value) => Some(value.parse().map_err(|_| {
                AppError::Validation(format!("Invalid WRH_STORAGE_QUOTA_BYTES: {}", value))
            })?),
            Err(_) => None,
        };

        let seed_demo = env::var("WRH_SEED_DEMO")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let session_idle_timeout = Duration::from_secs(parse_var("WRH_SESSION_IDLE_SECS", 1800)?);
        let max_sessions = parse_var("WRH_MAX_SESSIONS", 256)?;

        Ok(Self {
            api_psk,
            storage,
            db_path,
            index_path,
            bind_addr,
            log_level,
            log_format,
            storage_quota_bytes,
            seed_demo,
            session_idle_timeout,
            max_sessions,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid {}: {}", name, value))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for var in [
            "WRH_API_PSK",
            "WRH_STORAGE",
            "WRH_DB_PATH",
            "WRH_INDEX_PATH",
            "WRH_BIND_ADDR",
            "WRH_LOG_LEVEL",
            "WRH_LOG_FORMAT",
            "WRH_STORAGE_QUOTA_BYTES",
            "WRH_SEED_DEMO",
            "WRH_SESSION_IDLE_SECS",
            "WRH_MAX_SESSIONS",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.storage, StorageBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("./data/wrh.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.storage_quota_bytes.is_none());
        assert!(!config.seed_demo);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.max_sessions, 256);
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(StorageBackend::parse("memory"), Some(StorageBackend::Memory));
        assert_eq!(StorageBackend::parse(" SQLite "), Some(StorageBackend::Sqlite));
        assert_eq!(StorageBackend::parse("redis"), None);
    }
}
