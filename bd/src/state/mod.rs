//! State management with actor pattern
//!
//! StateManager owns the RowStore and processes messages via channels,
//! providing thread-safe access to persistent state. It also serves as the
//! remote collaborator for the pipeline board and goal tracker.

mod manager;
mod messages;
mod remote;

pub use manager::{StateEvent, StateManager};
pub use messages::{StateCommand, StateError, StateResponse};
