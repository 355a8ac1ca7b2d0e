//! create_notification - push a notification to the owner's inbox

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{optional_str, required_str};
use crate::domain::Notification;
use crate::tools::{StagedWrite, Tool, ToolContext, ToolError};

const KINDS: [&str; 4] = ["info", "warning", "success", "alert"];

pub struct CreateNotificationTool;

#[async_trait]
impl Tool for CreateNotificationTool {
    fn name(&self) -> &'static str {
        "create_notification"
    }

    fn description(&self) -> &'static str {
        "Send a notification to the business owner."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "message": { "type": "string" },
                "type": { "type": "string", "enum": KINDS, "default": "info" }
            },
            "required": ["title", "message"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "CreateNotificationTool::execute: called");
        let title = required_str(&input, "title")?;
        let message = required_str(&input, "message")?;
        let kind = optional_str(&input, "type").unwrap_or("info");
        if !KINDS.contains(&kind) {
            return Err(ToolError::InvalidArgument(format!(
                "type must be one of {}, got {}",
                KINDS.join(", "),
                kind
            )));
        }

        let notification = Notification::new(ctx.owner_id(), title, message, kind);
        let result = json!({
            "created": true,
            "notification_id": notification.id,
            "type": kind,
        });
        ctx.stage(StagedWrite::CreateNotification(notification)).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testing::context;

    #[tokio::test]
    async fn test_defaults_to_info() {
        let ctx = context();
        let out = CreateNotificationTool
            .execute(json!({"title": "Meta", "message": "Faltam 3 clientes"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["type"], "info");
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind() {
        let ctx = context();
        let result = CreateNotificationTool
            .execute(json!({"title": "x", "message": "y", "type": "spam"}), &ctx)
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArgument(_))));
    }
}
