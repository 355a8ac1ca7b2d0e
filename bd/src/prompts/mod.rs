//! Prompt Template System
//!
//! System prompts for the AI manager, one per assistant action.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.hbs` (configured override)
//! 2. Embedded default compiled from `bd/prompts/`
//!
//! Templates use Handlebars syntax for variable substitution.

mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLoader};
