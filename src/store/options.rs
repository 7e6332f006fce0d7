use std::time::Duration;

use super::retry::RetryConfig;
use crate::error::StorageError;

/// Immutable settings shared by every session the store opens.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    connection_string: String,
    max_connections: u32,
    acquire_timeout: Duration,
    command_timeout: Duration,
    retry: RetryConfig,
}

impl StorageOptions {
    /// Start building options for the given connection string.
    pub fn builder(connection_string: impl Into<String>) -> StorageOptionsBuilder {
        StorageOptionsBuilder::new(connection_string)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Upper bound for a single attempt of a database call.
    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

#[derive(Debug, Clone)]
pub struct StorageOptionsBuilder {
    connection_string: String,
    max_connections: u32,
    acquire_timeout: Duration,
    command_timeout: Duration,
    retry: RetryConfig,
}

impl StorageOptionsBuilder {
    fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validate and freeze the options.
    pub fn build(self) -> Result<StorageOptions, StorageError> {
        let connection_string = self.connection_string.trim().to_string();
        if connection_string.is_empty() {
            return Err(StorageError::Configuration(
                "connection string is required".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StorageError::Configuration(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.acquire_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err(StorageError::Configuration(
                "timeouts must be greater than zero".into(),
            ));
        }

        Ok(StorageOptions {
            connection_string,
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
            command_timeout: self.command_timeout,
            retry: self.retry,
        })
    }
}
