//! Business snapshot rendered into the system prompt

use chrono::NaiveDate;
use tracing::debug;

use crate::export::MetricsSnapshot;
use crate::prompts::PromptContext;
use crate::state::{StateManager, StateResponse};

/// Collect everything the prompt templates reference
pub async fn gather(state: &StateManager, today: NaiveDate, tool_names: Vec<String>) -> StateResponse<PromptContext> {
    debug!(owner_id = %state.owner_id(), %today, "gather: called");
    let snapshot = MetricsSnapshot::collect(state, today).await?;
    Ok(PromptContext::new(
        today,
        snapshot.business,
        snapshot.pipeline,
        snapshot.goals,
        tool_names,
    ))
}
