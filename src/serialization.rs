//! Serialization providers used to turn stored values into the `value` column and back.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Converts values to and from their stored string form.
pub trait SerializationProvider: Send + Sync {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, BoxError>;

    fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T, BoxError>;
}

/// Default provider: compact JSON via serde_json.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl SerializationProvider for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, BoxError> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &str) -> Result<T, BoxError> {
        Ok(serde_json::from_str(data)?)
    }
}
