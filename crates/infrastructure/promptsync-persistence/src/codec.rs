use serde_json::Value;

use crate::StorageError;

pub fn encode_value(value: &Value) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_value(bytes: &[u8]) -> Result<Value, StorageError> {
    Ok(serde_json::from_slice(bytes)?)
}
