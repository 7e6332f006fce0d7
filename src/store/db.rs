//! Database session factory.
//!
//! Owns the connection pool and the retry/timeout policy shared by every call.
//! The pool is reached through sqlx's `Any` driver: `postgres://` URLs in
//! production, `sqlite:` URLs for local development and tests.

use std::future::Future;
use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use tracing::info;

use super::options::StorageOptions;
use super::retry::RetryPolicy;
use crate::error::StorageError;

const CREATE_TOKENS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS tokens (
        id      TEXT PRIMARY KEY NOT NULL,
        value   TEXT NOT NULL
    )
"#;

const COUNT_TOKENS: &str = "SELECT COUNT(*) FROM tokens";

/// Connection pool plus the policy applied to each database call.
pub struct Database {
    pool: AnyPool,
    retry: RetryPolicy,
    command_timeout: Duration,
}

impl Database {
    /// Build the pool and open the first connection, retrying transient failures.
    pub async fn connect(options: &StorageOptions) -> Result<Self, StorageError> {
        install_default_drivers();

        let retry = RetryPolicy::new(options.retry().clone());
        let pool = retry
            .execute(|| async move {
                pool_options(options)
                    .connect(options.connection_string())
                    .await
                    .map_err(connect_error)
            })
            .await?;

        info!(
            "Connected to {} token database (pool size {})",
            backend_name(options.connection_string()),
            pool.options().get_max_connections()
        );

        Ok(Self {
            pool,
            retry,
            command_timeout: options.command_timeout(),
        })
    }

    /// Apply the token schema. Idempotent: a no-op when the schema is current.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        self.execute(|| async move {
            let mut session = self.session().await?;
            sqlx::query(CREATE_TOKENS_TABLE)
                .execute(&mut *session)
                .await?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Migration(e.to_string()))?;

        info!("Token schema is up to date");
        Ok(())
    }

    /// Acquire a connection for the duration of one call.
    ///
    /// The connection goes back to the pool when the guard is dropped.
    pub async fn session(&self) -> Result<PoolConnection<Any>, StorageError> {
        Ok(self.pool.acquire().await?)
    }

    /// Number of stored tokens.
    pub async fn token_count(&self) -> Result<i64, StorageError> {
        self.execute(|| async move {
            let mut session = self.session().await?;
            let count: i64 = sqlx::query_scalar(COUNT_TOKENS)
                .fetch_one(&mut *session)
                .await?;
            Ok(count)
        })
        .await
    }

    /// Run one database call under the retry policy, bounding every attempt
    /// by the command timeout. Timed-out attempts are retried, so `operation`
    /// must be safe to repeat.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        self.run(operation, StorageError::is_transient).await
    }

    /// Like [`Database::execute`], but a timed-out attempt is returned as
    /// [`StorageError::Timeout`] instead of being retried: the statement may
    /// already have been applied, and repeating it would report a different outcome.
    pub async fn execute_once_on_timeout<F, Fut, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        self.run(operation, |e| matches!(e, StorageError::Transient(_)))
            .await
    }

    async fn run<F, Fut, T, P>(&self, mut operation: F, retryable: P) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
        P: Fn(&StorageError) -> bool,
    {
        let timeout = self.command_timeout;
        self.retry
            .execute_if(
                || {
                    let attempt = operation();
                    async move {
                        match tokio::time::timeout(timeout, attempt).await {
                            Ok(result) => result,
                            Err(_) => Err(StorageError::Timeout(timeout)),
                        }
                    }
                },
                retryable,
            )
            .await
    }

    /// Expose the pool for administrative use.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Close every pooled connection. Later calls fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// An in-memory SQLite database lives inside a single connection, so the pool
/// is pinned to exactly one connection that is never recycled.
fn pool_options(options: &StorageOptions) -> AnyPoolOptions {
    let pool = AnyPoolOptions::new()
        .max_connections(options.max_connections())
        .acquire_timeout(options.acquire_timeout());

    if is_sqlite_memory(options.connection_string()) {
        pool.max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        pool
    }
}

fn is_sqlite_memory(connection_string: &str) -> bool {
    connection_string.starts_with("sqlite:")
        && (connection_string.contains(":memory:") || connection_string.contains("mode=memory"))
}

fn connect_error(e: sqlx::Error) -> StorageError {
    match e {
        sqlx::Error::Configuration(e) => StorageError::Configuration(e.to_string()),
        other => other.into(),
    }
}

/// URL scheme only, so credentials never reach the logs.
fn backend_name(connection_string: &str) -> &str {
    connection_string
        .split(':')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn memory_options() -> StorageOptions {
        StorageOptions::builder("sqlite::memory:")
            .max_connections(1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_backend_name_hides_credentials() {
        assert_eq!(backend_name("postgres://admin:hunter2@db/tokens"), "postgres");
        assert_eq!(backend_name("sqlite::memory:"), "sqlite");
        assert_eq!(backend_name(""), "unknown");
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::connect(&memory_options()).await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();

        assert_eq!(db.token_count().await.unwrap(), 0);
    }

    #[test]
    fn test_in_memory_sqlite_detection() {
        assert!(is_sqlite_memory("sqlite::memory:"));
        assert!(is_sqlite_memory("sqlite://file:tokens?mode=memory&cache=shared"));
        assert!(!is_sqlite_memory("sqlite://data/tokens.db?mode=rwc"));
        assert!(!is_sqlite_memory("postgres://localhost/tokens"));
    }

    #[tokio::test]
    async fn test_in_memory_pool_is_pinned_to_one_connection() {
        let options = StorageOptions::builder("sqlite::memory:").build().unwrap();
        assert_eq!(options.max_connections(), 10);

        let db = Database::connect(&options).await.unwrap();
        let pool_options = db.pool().options();
        assert_eq!(pool_options.get_max_connections(), 1);
        assert_eq!(pool_options.get_min_connections(), 1);
        assert_eq!(pool_options.get_idle_timeout(), None);
        assert_eq!(pool_options.get_max_lifetime(), None);
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_configuration_error() {
        let options = StorageOptions::builder("nosuchdb://localhost/x")
            .build()
            .unwrap();
        let result = Database::connect(&options).await;
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let options = StorageOptions::builder("sqlite::memory:")
            .max_connections(1)
            .command_timeout(Duration::from_millis(10))
            .retry(
                crate::store::RetryConfig::default()
                    .with_max_retries(1)
                    .with_initial_delay(Duration::from_millis(1))
                    .without_jitter(),
            )
            .build()
            .unwrap();
        let db = Database::connect(&options).await.unwrap();

        let result: Result<(), _> = db
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(
            result,
            Err(StorageError::Unavailable { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_once_on_timeout_does_not_repeat() {
        let options = StorageOptions::builder("sqlite::memory:")
            .command_timeout(Duration::from_millis(10))
            .retry(
                crate::store::RetryConfig::default()
                    .with_max_retries(3)
                    .with_initial_delay(Duration::from_millis(1))
                    .without_jitter(),
            )
            .build()
            .unwrap();
        let db = Database::connect(&options).await.unwrap();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = db
            .execute_once_on_timeout(|| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StorageError::Timeout(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_once_on_timeout_retries_transient_errors() {
        let options = StorageOptions::builder("sqlite::memory:")
            .retry(
                crate::store::RetryConfig::default()
                    .with_initial_delay(Duration::from_millis(1))
                    .without_jitter(),
            )
            .build()
            .unwrap();
        let db = Database::connect(&options).await.unwrap();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = db
            .execute_once_on_timeout(|| async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StorageError::Transient("connection reset".into()))
                } else {
                    Ok(true)
                }
            })
            .await;

        assert!(result.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
