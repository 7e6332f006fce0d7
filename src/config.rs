use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::StorageError;
use crate::store::StorageOptions;

/// Token store configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL (or SQLite, for local dev) connection string.
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Per-attempt bound on a single database call.
    pub command_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs = |name: &str, default: u64| -> Result<Duration> {
            let value = lookup(name)
                .map(|v| v.parse::<u64>())
                .transpose()
                .with_context(|| format!("Invalid {name}"))?
                .unwrap_or(default);
            Ok(Duration::from_secs(value))
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL")
                .context("DATABASE_URL is required (token database connection string)")?,
            max_connections: lookup("TOKEN_STORE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".into())
                .parse()
                .context("Invalid TOKEN_STORE_MAX_CONNECTIONS")?,
            acquire_timeout: secs("TOKEN_STORE_ACQUIRE_TIMEOUT_SECS", 30)?,
            command_timeout: secs("TOKEN_STORE_COMMAND_TIMEOUT_SECS", 30)?,
        })
    }

    /// Validated storage options. Retry count and delay keep their defaults.
    pub fn storage_options(&self) -> Result<StorageOptions, StorageError> {
        StorageOptions::builder(&self.database_url)
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .command_timeout(self.command_timeout)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.command_timeout, Duration::from_secs(30));

        let options = config.storage_options().unwrap();
        assert_eq!(options.retry().max_retries, 3);
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("TOKEN_STORE_COMMAND_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tokens"),
            ("TOKEN_STORE_MAX_CONNECTIONS", "4"),
            ("TOKEN_STORE_COMMAND_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.command_timeout, Duration::from_secs(5));
    }
}
