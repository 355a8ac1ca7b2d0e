//! get_tasks_summary - counts and the most pressing open tasks

use std::cmp::Reverse;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Priority, Task, TaskStatus};
use crate::tools::{Tool, ToolContext, ToolError};

const TOP_OPEN: usize = 10;

pub struct TasksSummaryTool;

#[async_trait]
impl Tool for TasksSummaryTool {
    fn name(&self) -> &'static str {
        "get_tasks_summary"
    }

    fn description(&self) -> &'static str {
        "Summarize the owner's tasks: counts by status and priority, overdue tasks, and the most urgent open ones."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!("TasksSummaryTool::execute: called");
        let tasks = ctx.state.list_owned::<Task>(vec![]).await?;
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

        let mut open: Vec<&Task> = tasks.iter().filter(|t| t.status != TaskStatus::Done).collect();
        // Most urgent first, then earliest due date, undated last
        open.sort_by_key(|t| (Reverse(t.priority), t.due_date.is_none(), t.due_date));

        let by_priority: serde_json::Map<String, Value> = [Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]
            .into_iter()
            .map(|p| (p.to_string(), json!(open.iter().filter(|t| t.priority == p).count())))
            .collect();

        Ok(json!({
            "total": tasks.len(),
            "todo": count(TaskStatus::Todo),
            "in_progress": count(TaskStatus::InProgress),
            "done": count(TaskStatus::Done),
            "overdue": tasks.iter().filter(|t| t.is_overdue(ctx.today)).count(),
            "open_by_priority": by_priority,
            "top_open": open.iter().take(TOP_OPEN).map(|t| json!({
                "id": t.id,
                "title": t.title,
                "priority": t.priority,
                "status": t.status,
                "due_date": t.due_date,
            })).collect::<Vec<_>>(),
        }))
    }
}
