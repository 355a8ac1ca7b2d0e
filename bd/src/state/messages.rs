//! State manager messages
//!
//! Commands and responses for the actor pattern. Records cross the channel
//! as untyped documents so the actor needs no per-type command variants.

use rowstore::{Document, Filter};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Channel error")]
    ChannelError,
}

impl StateError {
    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreError(err.to_string())
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    Insert {
        doc: Document,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    Get {
        collection: String,
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Value>>>,
    },
    /// Replace one or more documents in a single transaction
    Update {
        docs: Vec<Document>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    Delete {
        collection: String,
        id: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    List {
        collection: String,
        filters: Vec<Filter>,
        reply: oneshot::Sender<StateResponse<Vec<Value>>>,
    },

    // Shutdown
    Shutdown,
}
