//! This module exports different types for JSON interactions.

use serde::de::DeserializeOwned;
use serde::ser::Serialize;

use crate::Result;

pub type Value = serde_json::Value;
pub type JsonMap = serde_json::Map<String, Value>;

pub use serde_json::json;
pub use serde_json::Error as JsonError;

pub const NULL: Value = Value::Null;

#[allow(clippy::missing_errors_doc)] // It's obvious
pub fn to_string<T>(v: &T) -> Result<String>
where
    T: Serialize,
{
    Ok(serde_json::to_string(v)?)
}

#[allow(clippy::missing_errors_doc)]
pub fn to_vec<T>(v: &T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    Ok(serde_json::to_vec(v)?)
}

#[allow(clippy::missing_errors_doc)]
pub fn to_value<T>(v: &T) -> Result<Value>
where
    T: Serialize,
{
    Ok(serde_json::to_value(v)?)
}

#[allow(clippy::missing_errors_doc)]
pub fn from_slice<T>(bytes: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_slice(bytes)?)
}

#[allow(clippy::missing_errors_doc)]
pub fn from_value<T>(v: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(v)?)
}
