//! Token store: a key-value [`Storage`] contract over a single SQL table.
//!
//! - `db`: session factory (pool, migration, retry + timeout)
//! - `sql`: the `Storage` implementation
//! - `options` / `retry`: startup configuration

pub mod db;
pub mod options;
pub mod retry;
pub mod sql;
pub mod traits;

pub use db::Database;
pub use options::{StorageOptions, StorageOptionsBuilder};
pub use retry::{RetryConfig, RetryPolicy};
pub use sql::SqlStorage;
pub use traits::Storage;

use std::future::Future;
use std::sync::Arc;

use crate::error::StorageError;

/// Connect, apply the schema and build the storage.
///
/// Must complete before the storage serves traffic; an error here is fatal to startup.
pub async fn register_sql_storage<T>(options: StorageOptions) -> Result<SqlStorage<T>, StorageError> {
    let database = Database::connect(&options).await?;
    database.migrate().await?;
    Ok(SqlStorage::new(Arc::new(database)))
}

/// Race a storage operation against a cancellation signal.
///
/// When `signal` completes first the operation future is dropped, releasing its
/// session, and `StorageError::Cancelled` is returned. A statement already sent
/// may still complete on the server.
pub async fn with_cancellation<T, C, F>(signal: C, operation: F) -> Result<T, StorageError>
where
    C: Future,
    F: Future<Output = Result<T, StorageError>>,
{
    tokio::select! {
        biased;
        _ = signal => Err(StorageError::Cancelled),
        result = operation => result,
    }
}
