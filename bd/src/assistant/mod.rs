//! AI manager
//!
//! Answers chat messages and produces daily briefings over the owner's
//! business data, with one optional round of tool calls.

mod context;
mod engine;
mod error;

pub use engine::{Assistant, AssistantAction, AssistantReply, ToolCallRecord};
pub use error::AssistantError;
