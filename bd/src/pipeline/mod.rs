//! Sales pipeline state container
//!
//! A client-held projection of stages and prospects kept consistent under
//! optimistic mutations, backed by a [`PipelineRemote`].

mod board;
mod error;
mod remote;
mod state;

pub use board::{BoardEvent, PipelineBoard};
pub use error::PipelineError;
pub use remote::PipelineRemote;
pub use state::{MovePlan, PipelineMetrics, PipelineState, project};
