pub mod config;
pub mod error;
pub mod models;
pub mod serialization;
pub mod store;

pub use config::Config;
pub use error::StorageError;
pub use models::{JwtRefreshToken, TokenRecord};
pub use serialization::{JsonSerializer, SerializationProvider};
pub use store::{
    register_sql_storage, with_cancellation, Database, RetryConfig, SqlStorage, Storage,
    StorageOptions,
};
