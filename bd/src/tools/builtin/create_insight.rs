//! create_insight - record an observation about the business

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{optional_str, required_str};
use crate::domain::Insight;
use crate::tools::{StagedWrite, Tool, ToolContext, ToolError};

pub struct CreateInsightTool;

#[async_trait]
impl Tool for CreateInsightTool {
    fn name(&self) -> &'static str {
        "create_insight"
    }

    fn description(&self) -> &'static str {
        "Save an insight about the business (sales, finance, productivity, clients)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "content": { "type": "string" },
                "category": {
                    "type": "string",
                    "enum": ["sales", "finance", "productivity", "clients", "general"],
                    "default": "general"
                }
            },
            "required": ["title", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "CreateInsightTool::execute: called");
        let title = required_str(&input, "title")?;
        let content = required_str(&input, "content")?;
        let category = optional_str(&input, "category").unwrap_or("general");

        let insight = Insight::new(ctx.owner_id(), title, content, category);
        let result = json!({
            "created": true,
            "insight_id": insight.id,
            "category": insight.category,
        });
        ctx.stage(StagedWrite::CreateInsight(insight)).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::testing::context;

    #[tokio::test]
    async fn test_create_insight() {
        let ctx = context();
        let out = CreateInsightTool
            .execute(
                json!({"title": "Ticket médio subiu", "content": "R$ 1.200 em maio", "category": "sales"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(out["category"], "sales");
        assert_eq!(ctx.staged().await.len(), 1);
    }

    #[tokio::test]
    async fn test_content_required() {
        let ctx = context();
        assert!(CreateInsightTool.execute(json!({"title": "x"}), &ctx).await.is_err());
    }
}
