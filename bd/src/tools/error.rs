//! Tool error types

use thiserror::Error;

use crate::state::StateError;

/// Errors that can occur during tool execution
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    UnknownTool { name: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl ToolError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::InvalidArgument(format!("missing required parameter: {}", field))
    }
}
