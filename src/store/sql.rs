//! SQL-backed [`Storage`] implementation.
//!
//! Each call opens its own session, runs a single statement against the
//! `tokens` table and releases the session before returning.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::db::Database;
use super::traits::Storage;
use crate::error::StorageError;
use crate::models::{JwtRefreshToken, TokenRecord};
use crate::serialization::{JsonSerializer, SerializationProvider};

const SELECT_ALL: &str = "SELECT id, value FROM tokens";
const SELECT_ONE: &str = "SELECT id, value FROM tokens WHERE id = $1 LIMIT 1";
const EXISTS: &str = "SELECT id FROM tokens WHERE id = $1 LIMIT 1";
const UPSERT: &str = r#"
    INSERT INTO tokens (id, value)
    VALUES ($1, $2)
    ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value
"#;
const DELETE_ONE: &str = "DELETE FROM tokens WHERE id = $1";
const DELETE_ALL: &str = "DELETE FROM tokens";

/// Token storage over a relational database.
pub struct SqlStorage<T = JwtRefreshToken, S = JsonSerializer> {
    database: Arc<Database>,
    serializer: S,
    _value: PhantomData<fn() -> T>,
}

impl<T> SqlStorage<T, JsonSerializer> {
    pub fn new(database: Arc<Database>) -> Self {
        Self::with_serializer(database, JsonSerializer)
    }
}

impl<T, S: SerializationProvider> SqlStorage<T, S> {
    pub fn with_serializer(database: Arc<Database>, serializer: S) -> Self {
        Self {
            database,
            serializer,
            _value: PhantomData,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }
}

impl<T: DeserializeOwned, S: SerializationProvider> SqlStorage<T, S> {
    fn decode(&self, record: &TokenRecord) -> Result<T, StorageError> {
        self.serializer
            .deserialize(&record.value)
            .map_err(|e| StorageError::Corrupt {
                key: record.id.clone(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl<T, S> Storage<T> for SqlStorage<T, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    S: SerializationProvider + 'static,
{
    async fn get_all(&self) -> Result<Vec<T>, StorageError> {
        let records = self
            .database
            .execute(|| async move {
                let mut session = self.database.session().await?;
                let records = sqlx::query_as::<_, TokenRecord>(SELECT_ALL)
                    .fetch_all(&mut *session)
                    .await?;
                Ok(records)
            })
            .await?;

        debug!("Loaded {} stored tokens", records.len());
        records.iter().map(|record| self.decode(record)).collect()
    }

    async fn get(&self, key: &str) -> Result<Option<T>, StorageError> {
        let record = self
            .database
            .execute(|| async move {
                let mut session = self.database.session().await?;
                let record = sqlx::query_as::<_, TokenRecord>(SELECT_ONE)
                    .bind(key)
                    .fetch_optional(&mut *session)
                    .await?;
                Ok(record)
            })
            .await?;

        debug!(key, found = record.is_some(), "Token lookup");
        record.as_ref().map(|r| self.decode(r)).transpose()
    }

    async fn contains(&self, key: &str) -> Result<bool, StorageError> {
        self.database
            .execute(|| async move {
                let mut session = self.database.session().await?;
                let row = sqlx::query(EXISTS)
                    .bind(key)
                    .fetch_optional(&mut *session)
                    .await?;
                Ok(row.is_some())
            })
            .await
    }

    async fn set(&self, key: &str, value: &T) -> Result<(), StorageError> {
        // Serialize before touching the database so a bad value never writes.
        let serialized = self
            .serializer
            .serialize(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let payload = serialized.as_str();

        self.database
            .execute(|| async move {
                let mut session = self.database.session().await?;
                sqlx::query(UPSERT)
                    .bind(key)
                    .bind(payload)
                    .execute(&mut *session)
                    .await?;
                Ok(())
            })
            .await?;

        debug!(key, "Token stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        // A repeated DELETE after a timeout could report `false` for a row the
        // first attempt already removed.
        let affected = self
            .database
            .execute_once_on_timeout(|| async move {
                let mut session = self.database.session().await?;
                let result = sqlx::query(DELETE_ONE)
                    .bind(key)
                    .execute(&mut *session)
                    .await?;
                Ok(result.rows_affected())
            })
            .await?;

        debug!(key, removed = affected > 0, "Token remove");
        Ok(affected > 0)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let affected = self
            .database
            .execute(|| async move {
                let mut session = self.database.session().await?;
                let result = sqlx::query(DELETE_ALL).execute(&mut *session).await?;
                Ok(result.rows_affected())
            })
            .await?;

        debug!("Cleared {affected} stored tokens");
        Ok(())
    }
}
