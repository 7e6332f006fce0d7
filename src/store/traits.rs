use async_trait::async_trait;

use crate::error::StorageError;

/// Key-value contract the token service persists refresh tokens through.
///
/// Keys are exact, case-sensitive matches. A missing key is never an error:
/// it is reported as `None` / `false`.
#[async_trait]
pub trait Storage<T>: Send + Sync {
    /// Every stored value, in no particular order.
    async fn get_all(&self) -> Result<Vec<T>, StorageError>;

    async fn get(&self, key: &str) -> Result<Option<T>, StorageError>;

    /// Same presence answer as `get`, without decoding the payload.
    async fn contains(&self, key: &str) -> Result<bool, StorageError>;

    /// Insert or overwrite the value stored under `key`.
    async fn set(&self, key: &str, value: &T) -> Result<(), StorageError>;

    /// Returns whether a value was deleted.
    ///
    /// A call that times out is not repeated and fails with
    /// [`StorageError::Timeout`]; the row may or may not have been deleted.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}
