//! create_task - add a task to the owner's list

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use tracing::debug;

use super::{optional_parsed, optional_str, required_str};
use crate::domain::{Priority, Task};
use crate::tools::{StagedWrite, Tool, ToolContext, ToolError};

pub struct CreateTaskTool;

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &'static str {
        "create_task"
    }

    fn description(&self) -> &'static str {
        "Create a new task for the business owner."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Short task title" },
                "description": { "type": "string" },
                "priority": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "urgent"],
                    "default": "medium"
                },
                "due_date": { "type": "string", "description": "Due date as YYYY-MM-DD" }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "CreateTaskTool::execute: called");
        let title = required_str(&input, "title")?;
        let priority = optional_parsed::<Priority>(&input, "priority")?.unwrap_or_default();
        let due_date = optional_str(&input, "due_date")
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| ToolError::InvalidArgument(format!("due_date must be YYYY-MM-DD, got {}", s)))
            })
            .transpose()?;

        let mut task = Task::new(ctx.owner_id(), title);
        task.description = optional_str(&input, "description").map(String::from);
        task.priority = priority;
        task.due_date = due_date;

        let result = json!({
            "created": true,
            "task_id": task.id,
            "title": task.title,
            "priority": task.priority,
            "due_date": task.due_date,
        });
        ctx.stage(StagedWrite::CreateTask(task)).await;
        Ok(result)
    }
}
