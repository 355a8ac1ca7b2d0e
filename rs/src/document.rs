//! Untyped row representation shared between callers and the store

use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;

use crate::{IndexValue, Record};

/// A serialized record plus its index entries
///
/// Documents let a record cross a channel boundary without the receiver
/// knowing its concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub updated_at: i64,
    pub data: Value,
    pub indexes: HashMap<String, IndexValue>,
}

impl Document {
    /// Serialize a typed record into a document
    pub fn from_record<T: Record>(record: &T) -> Result<Self> {
        let data = serde_json::to_value(record).context(format!("Failed to serialize {}", T::collection_name()))?;
        Ok(Self {
            collection: T::collection_name().to_string(),
            id: record.id().to_string(),
            updated_at: record.updated_at(),
            data,
            indexes: record.indexed_fields(),
        })
    }

    /// Deserialize the document body back into a typed record
    pub fn into_record<T: Record>(self) -> Result<T> {
        decode(self.data)
    }
}

/// Deserialize a row body into a typed record
pub(crate) fn decode<T: Record>(data: Value) -> Result<T> {
    serde_json::from_value(data).context(format!("Failed to deserialize {}", T::collection_name()))
}
