//! bizdesk - sales pipeline, goal tracking and an AI manager
//!
//! bizdesk keeps a small business's sales pipeline, goals and day-to-day
//! records in a local row store and puts an AI manager on top that can read
//! and act on them.
//!
//! # Core Concepts
//!
//! - **Optimistic board**: pipeline edits apply locally first and roll back
//!   when the store rejects them
//! - **Remote-authoritative outcomes**: won, lost and convert go to the store
//!   first, then the board reloads
//! - **Two-round assistant**: at most one round of tool calls, whose writes are
//!   committed only once the final answer arrives
//!
//! # Modules
//!
//! - [`progress`] - Goal progress engine
//! - [`pipeline`] - Pipeline state container
//! - [`goals`] - Goal lifecycle
//! - [`state`] - StateManager actor over the row store
//! - [`assistant`] - AI manager with its [`tools`] and [`prompts`]
//! - [`export`] - JSON and CSV snapshots
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assistant;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod goals;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod repl;
pub mod state;
pub mod tools;

// Re-export commonly used types
pub use assistant::{Assistant, AssistantAction, AssistantError, AssistantReply};
pub use config::{Config, LlmConfig};
pub use domain::{
    Client, Filter, FilterOp, Goal, GoalStatus, IndexValue, MetricKind, MetricValues, Priority, Prospect,
    ProspectStatus, Record, Stage, Store,
};
pub use export::MetricsSnapshot;
pub use goals::{GoalError, GoalRemote, GoalTracker, NewGoal};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient, create_client};
pub use pipeline::{BoardEvent, PipelineBoard, PipelineError, PipelineMetrics, PipelineRemote, PipelineState};
pub use progress::{GoalProgress, goal_progress};
pub use prompts::{PromptContext, PromptLoader};
pub use state::{StateCommand, StateError, StateManager, StateResponse};
pub use tools::{Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
