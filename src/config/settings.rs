//! Application settings loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::constants::{
    DEFAULT_CACHE_FILL_TTL_SECONDS, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_DATABASE_URL, DEFAULT_DELETION_BATCH_SIZE,
    DEFAULT_DELETION_POLL_INTERVAL_MS, DEFAULT_DELETION_QUEUE_NAME, DEFAULT_REDIS_URL,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_TRANSACTION_TIMEOUT_SECONDS,
    DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
};

/// Which family of backends the process wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL + Redis cache + Redis queue
    Postgres,
    /// Process-local stores, for development and tests
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub storage_backend: StorageBackend,
    pub cache_ttl: Duration,
    pub cache_fill_ttl: Duration,
    pub transaction_timeout: Duration,
    pub deletion_queue_name: String,
    pub visibility_timeout: Duration,
    pub deletion_batch_size: i64,
    pub deletion_poll_interval: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("storage_backend", &self.storage_backend)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_fill_ttl", &self.cache_fill_ttl)
            .field("transaction_timeout", &self.transaction_timeout)
            .field("deletion_queue_name", &self.deletion_queue_name)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("deletion_batch_size", &self.deletion_batch_size)
            .field("deletion_poll_interval", &self.deletion_poll_interval)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            storage_backend: StorageBackend::Postgres,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            cache_fill_ttl: Duration::from_secs(DEFAULT_CACHE_FILL_TTL_SECONDS),
            transaction_timeout: Duration::from_secs(DEFAULT_TRANSACTION_TIMEOUT_SECONDS),
            deletion_queue_name: DEFAULT_DELETION_QUEUE_NAME.to_string(),
            visibility_timeout: Duration::from_secs(DEFAULT_VISIBILITY_TIMEOUT_SECONDS),
            deletion_batch_size: DEFAULT_DELETION_BATCH_SIZE,
            deletion_poll_interval: Duration::from_millis(DEFAULT_DELETION_POLL_INTERVAL_MS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults in `constants`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                tracing::warn!("{}, falling back to postgres", e);
                StorageBackend::Postgres
            }),
            Err(_) => defaults.storage_backend,
        };

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            storage_backend,
            cache_ttl: parse_env("USER_CACHE_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_fill_ttl: parse_env("USER_CACHE_FILL_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_fill_ttl),
            transaction_timeout: parse_env("TRANSACTION_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.transaction_timeout),
            deletion_queue_name: env::var("DELETION_QUEUE_NAME")
                .unwrap_or(defaults.deletion_queue_name),
            visibility_timeout: parse_env("QUEUE_VISIBILITY_TIMEOUT_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            deletion_batch_size: parse_env("DELETION_BATCH_SIZE")
                .unwrap_or(defaults.deletion_batch_size),
            deletion_poll_interval: parse_env("DELETION_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.deletion_poll_interval),
        }
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("postgres".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_debug_output_redacts_connection_urls() {
        let config = Config {
            database_url: "postgres://admin:hunter2@db/app".to_string(),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
