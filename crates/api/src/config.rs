//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::CoordinatorConfig;
use store::DeleteMode;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the
///   in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default `10`)
/// - `STORE_OPERATION_TIMEOUT_MS`: per-operation bound (default `3000`)
/// - `STORE_MAX_CONFLICT_RETRIES`: retries for conflicting transactions
///   (default `3`)
/// - `CATALOG_DELETE_MODE`: `soft` or `hard` (default `soft`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub coordinator: CoordinatorConfig,
    pub delete_mode: DeleteMode,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let timeout_ms = parse_var(&var, "STORE_OPERATION_TIMEOUT_MS")?
            .unwrap_or(defaults.coordinator.operation_timeout.as_millis() as u64);
        let retries = parse_var(&var, "STORE_MAX_CONFLICT_RETRIES")?
            .unwrap_or(defaults.coordinator.max_conflict_retries);

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(&var, "PORT")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            coordinator: defaults
                .coordinator
                .operation_timeout(Duration::from_millis(timeout_ms))
                .max_conflict_retries(retries),
            delete_mode: parse_var(&var, "CATALOG_DELETE_MODE")?.unwrap_or(defaults.delete_mode),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            coordinator: CoordinatorConfig::default(),
            delete_mode: DeleteMode::Soft,
        }
    }
}
