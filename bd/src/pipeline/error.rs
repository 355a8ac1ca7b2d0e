use thiserror::Error;

use crate::state::StateError;

/// Errors from pipeline board operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Stage '{0}' still has prospects")]
    StageNotEmpty(String),

    #[error("Stage '{0}' is a win, loss or default stage and cannot be deleted")]
    ProtectedStage(String),

    #[error("Prospect {0} has not been saved yet")]
    Pending(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Remote error: {0}")]
    Remote(#[from] StateError),
}

impl PipelineError {
    /// Whether the failure happened before any remote call was issued
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }
}
