//! Tool system for the AI manager
//!
//! Tools let the model read the owner's business data and request changes.
//! Each turn gets a `ToolContext` scoped to one owner; writes are staged
//! there and committed by the assistant once the final answer succeeds.

mod context;
mod error;
mod executor;
mod traits;

pub mod builtin;

pub use context::{StagedWrite, ToolContext};
pub use error::ToolError;
pub use executor::ToolExecutor;
pub use traits::{Tool, ToolResult};
