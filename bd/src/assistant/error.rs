//! Assistant error types

use thiserror::Error;

use crate::llm::LlmError;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Model returned an empty answer")]
    EmptyResponse,

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
