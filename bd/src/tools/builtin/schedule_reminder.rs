//! schedule_reminder - remind the owner at a given time

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Value, json};
use tracing::debug;

use super::{optional_str, required_str};
use crate::domain::Reminder;
use crate::tools::{StagedWrite, Tool, ToolContext, ToolError};

/// Reminders given as a bare date fire at this hour
const DEFAULT_HOUR: u32 = 9;

/// Parse RFC 3339, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD` into epoch milliseconds
fn parse_remind_at(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Some(dt.and_utc().timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?;
    Some(date.and_time(time).and_utc().timestamp_millis())
}

pub struct ScheduleReminderTool;

#[async_trait]
impl Tool for ScheduleReminderTool {
    fn name(&self) -> &'static str {
        "schedule_reminder"
    }

    fn description(&self) -> &'static str {
        "Schedule a reminder for the business owner."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "remind_at": {
                    "type": "string",
                    "description": "When to remind: RFC 3339, 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD'"
                },
                "message": { "type": "string" }
            },
            "required": ["title", "remind_at"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "ScheduleReminderTool::execute: called");
        let title = required_str(&input, "title")?;
        let raw = required_str(&input, "remind_at")?;
        let remind_at = parse_remind_at(raw)
            .ok_or_else(|| ToolError::InvalidArgument(format!("unrecognised remind_at: {}", raw)))?;

        let today_start = ctx
            .today
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(0);
        if remind_at < today_start {
            return Err(ToolError::InvalidArgument(format!("remind_at {} is in the past", raw)));
        }

        let mut reminder = Reminder::new(ctx.owner_id(), title, remind_at);
        reminder.message = optional_str(&input, "message").map(String::from);
        let result = json!({
            "scheduled": true,
            "reminder_id": reminder.id,
            "remind_at": remind_at,
        });
        ctx.stage(StagedWrite::CreateReminder(reminder)).await;
        Ok(result)
    }
}
