//! Flattened metadata codec.
//!
//! Stored records only hold primitive metadata values. Everything else (null, arrays,
//! objects, integers outside `i64`) crosses the boundary as canonical JSON text, tagged so
//! decoding knows which representation it is reading:
//!
//! ```text
//! Value::String  ─> {"t":"str","v":"add"}
//! Value::Number  ─> {"t":"int","v":3} | {"t":"float","v":0.5}
//! Value::Bool    ─> {"t":"bool","v":true}
//! other          ─> {"t":"json","v":"[\"a\",\"b\"]"}
//! ```
//!
//! `decode(encode(v)) == v` holds for every JSON value.

use crate::error::{Result, VectorStoreError};
use devagent_code_chunker::ChunkMetadata;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Metadata value as held by a stored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum StoredValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Non-primitive value serialized as JSON text
    Json(String),
}

pub type FlatMetadata = BTreeMap<String, StoredValue>;

pub fn encode_value(value: &Value) -> Result<StoredValue> {
    let stored = match value {
        Value::String(s) => StoredValue::Str(s.clone()),
        Value::Bool(b) => StoredValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                StoredValue::Int(i)
            } else if n.is_f64() {
                match n.as_f64() {
                    Some(f) => StoredValue::Float(f),
                    None => StoredValue::Json(serde_json::to_string(value)?),
                }
            } else {
                // u64 above i64::MAX
                StoredValue::Json(serde_json::to_string(value)?)
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => {
            StoredValue::Json(serde_json::to_string(value)?)
        }
    };
    Ok(stored)
}

pub fn decode_value(key: &str, stored: &StoredValue) -> Result<Value> {
    match stored {
        StoredValue::Str(s) => Ok(Value::String(s.clone())),
        StoredValue::Int(i) => Ok(Value::from(*i)),
        StoredValue::Bool(b) => Ok(Value::Bool(*b)),
        StoredValue::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
            VectorStoreError::CorruptMetadata {
                key: key.to_string(),
                reason: format!("non-finite float {f}"),
            }
        }),
        StoredValue::Json(text) => {
            serde_json::from_str(text).map_err(|e| VectorStoreError::CorruptMetadata {
                key: key.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

pub fn encode(metadata: &ChunkMetadata) -> Result<FlatMetadata> {
    metadata
        .iter()
        .map(|(key, value)| Ok((key.clone(), encode_value(value)?)))
        .collect()
}

pub fn decode(flat: &FlatMetadata) -> Result<ChunkMetadata> {
    flat.iter()
        .map(|(key, stored)| Ok((key.clone(), decode_value(key, stored)?)))
        .collect()
}
