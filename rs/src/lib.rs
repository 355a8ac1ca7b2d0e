//! RowStore - row-oriented record persistence
//!
//! Stores serde-serializable records as JSON rows grouped into named
//! collections, with a secondary index table so callers can query by
//! selected fields without deserializing every row.
//!
//! # Architecture
//!
//! ```text
//! {store_path}/
//! ├── .lock         # exclusive lock held while the store is open
//! └── rows.db       # SQLite: records + record_indexes
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rowstore::{Filter, FilterOp, IndexValue, Store};
//!
//! let mut store = Store::open(".bizdesk/store")?;
//! store.create(prospect)?;
//! let open = store.list::<Prospect>(&[Filter::eq("status", IndexValue::from("open"))])?;
//! ```

pub mod cli;
mod document;
mod store;

pub use document::Document;
pub use store::{CollectionStats, Store};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// File name of the SQLite database inside the store directory
pub const DB_FILE: &str = "rows.db";

/// File name of the lock file inside the store directory
pub const LOCK_FILE: &str = ".lock";

/// Current time as unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A value stored in the secondary index
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for IndexValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for IndexValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Substring match, string values only
    Contains,
}

impl FilterOp {
    fn sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "LIKE",
        }
    }
}

/// A single predicate over an indexed field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Equality filter on an indexed field
    pub fn eq(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }
}

/// A record that can be persisted in the store
///
/// The collection name is static per type; `indexed_fields` decides which
/// fields can be used in [`Filter`]s.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier within the collection
    fn id(&self) -> &str;

    /// Last modification time (unix ms)
    fn updated_at(&self) -> i64;

    /// Collection this record type lives in
    fn collection_name() -> &'static str;

    /// Fields exposed to the secondary index
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}
