//! Built-in tools for the AI manager

mod calculate_metric;
mod clients_summary;
mod create_insight;
mod create_notification;
mod create_task;
mod schedule_reminder;
mod tasks_summary;
mod update_task_priority;

pub use calculate_metric::CalculateMetricTool;
pub use clients_summary::ClientsSummaryTool;
pub use create_insight::CreateInsightTool;
pub use create_notification::CreateNotificationTool;
pub use create_task::CreateTaskTool;
pub use schedule_reminder::ScheduleReminderTool;
pub use tasks_summary::TasksSummaryTool;
pub use update_task_priority::UpdateTaskPriorityTool;

use serde_json::Value;

use super::ToolError;

/// Required non-empty string argument
fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::missing(key))
}

fn optional_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse an optional enum argument through `FromStr`
fn optional_parsed<T>(input: &Value, key: &str) -> Result<Option<T>, ToolError>
where
    T: std::str::FromStr<Err = String>,
{
    optional_str(input, key)
        .map(|s| s.parse::<T>().map_err(ToolError::InvalidArgument))
        .transpose()
}
