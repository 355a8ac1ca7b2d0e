//! ToolExecutor - dispatches model tool calls

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{
    CalculateMetricTool, ClientsSummaryTool, CreateInsightTool, CreateNotificationTool, CreateTaskTool,
    ScheduleReminderTool, TasksSummaryTool, UpdateTaskPriorityTool,
};
use super::{Tool, ToolContext, ToolError, ToolResult};

/// Registry of tools offered to the model
pub struct ToolExecutor {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Executor with the eight business tools
    pub fn standard() -> Self {
        debug!("ToolExecutor::standard: called");
        let mut executor = Self::empty();
        executor.add_tool(Box::new(CreateTaskTool));
        executor.add_tool(Box::new(UpdateTaskPriorityTool));
        executor.add_tool(Box::new(CreateNotificationTool));
        executor.add_tool(Box::new(CalculateMetricTool));
        executor.add_tool(Box::new(CreateInsightTool));
        executor.add_tool(Box::new(TasksSummaryTool));
        executor.add_tool(Box::new(ClientsSummaryTool));
        executor.add_tool(Box::new(ScheduleReminderTool));
        executor
    }

    pub fn empty() -> Self {
        Self { tools: BTreeMap::new() }
    }

    pub fn add_tool(&mut self, tool: Box<dyn Tool>) {
        debug!(tool_name = %tool.name(), "ToolExecutor::add_tool: called");
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM, ordered by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect()
    }

    /// Execute one tool call; failures become error results for the model
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool_name = %tool_call.name, tool_id = %tool_call.id, "ToolExecutor::execute: called");
        let result = match self.tools.get(&tool_call.name) {
            Some(tool) => tool.execute(tool_call.input.clone(), ctx).await,
            None => Err(ToolError::UnknownTool {
                name: tool_call.name.clone(),
            }),
        };
        if let Err(e) = &result {
            warn!(tool_name = %tool_call.name, error = %e, "Tool call failed");
        }
        result.into()
    }

    /// Execute calls in order, pairing each result with its call id
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        debug!(count = %tool_calls.len(), "ToolExecutor::execute_all: called");
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            results.push((call.id.clone(), self.execute(call, ctx).await));
        }
        results
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}
