use std::time::Duration;

/// Unified error type for the token store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    // ── Startup ─────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    // ── Connectivity ────────────────────────────────────────────────────
    #[error("Transient database error: {0}")]
    Transient(String),

    #[error("Database call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Permanent ───────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    Database(String),

    // ── Payload ─────────────────────────────────────────────────────────
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Stored value for key '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

impl StorageError {
    /// Whether the retry policy should attempt the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_) | StorageError::Timeout(_))
    }

    /// Whether a caller may reasonably retry the failed operation later.
    pub fn is_retry_candidate(&self) -> bool {
        !matches!(
            self,
            StorageError::Configuration(_)
                | StorageError::Serialization(_)
                | StorageError::Corrupt { .. }
        )
    }
}

// PostgreSQL: serialization failure, deadlock, too many connections, cannot connect now.
const PG_TRANSIENT_CODES: &[&str] = &["40001", "40P01", "53300", "57P03"];

// SQLite: SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
const SQLITE_TRANSIENT_CODES: &[&str] = &["5", "6", "261", "262", "517"];

fn is_transient_code(code: &str) -> bool {
    // Class 08: connection exception
    code.starts_with("08")
        || PG_TRANSIENT_CODES.contains(&code)
        || SQLITE_TRANSIENT_CODES.contains(&code)
}

/// Classify a sqlx error as transient (network blip, deadlock, pool exhaustion)
/// or permanent (constraint violation, bad SQL, decode failure).
pub fn is_transient_sqlx(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|c| is_transient_code(&c)),
        _ => false,
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient_sqlx(&e) {
            tracing::debug!("Transient database error: {e}");
            StorageError::Transient(e.to_string())
        } else {
            tracing::error!("Database error: {e}");
            StorageError::Database(e.to_string())
        }
    }
}
