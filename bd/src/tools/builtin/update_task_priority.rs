//! update_task_priority - change the priority of an existing task

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::required_str;
use crate::domain::{Priority, Task};
use crate::tools::{StagedWrite, Tool, ToolContext, ToolError};

pub struct UpdateTaskPriorityTool;

#[async_trait]
impl Tool for UpdateTaskPriorityTool {
    fn name(&self) -> &'static str {
        "update_task_priority"
    }

    fn description(&self) -> &'static str {
        "Change the priority of an existing task."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string" },
                "priority": { "type": "string", "enum": ["low", "medium", "high", "urgent"] }
            },
            "required": ["task_id", "priority"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "UpdateTaskPriorityTool::execute: called");
        let task_id = required_str(&input, "task_id")?;
        let priority: Priority = required_str(&input, "priority")?
            .parse()
            .map_err(ToolError::InvalidArgument)?;

        let task = match ctx.staged_task(task_id).await {
            Some(task) => task,
            None => ctx
                .state
                .get::<Task>(task_id)
                .await?
                .filter(|t| t.owner_id == ctx.owner_id())
                .ok_or_else(|| ToolError::NotFound(format!("task {}", task_id)))?,
        };

        ctx.stage(StagedWrite::SetTaskPriority {
            task_id: task.id.clone(),
            priority,
        })
        .await;
        Ok(json!({
            "updated": true,
            "task_id": task.id,
            "title": task.title,
            "previous_priority": task.priority,
            "priority": priority,
        }))
    }
}
