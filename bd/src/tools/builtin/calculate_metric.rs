//! calculate_metric - compute a business metric over a period

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{optional_parsed, required_str};
use crate::metrics::{BusinessMetric, MetricPeriod, compute_metric};
use crate::tools::{Tool, ToolContext, ToolError};

pub struct CalculateMetricTool;

#[async_trait]
impl Tool for CalculateMetricTool {
    fn name(&self) -> &'static str {
        "calculate_metric"
    }

    fn description(&self) -> &'static str {
        "Calculate a business metric (revenue, mrr, new_clients, tasks_completed, pending_tasks, pipeline_value) over a period."
    }

    fn input_schema(&self) -> Value {
        let metrics: Vec<String> = BusinessMetric::ALL.iter().map(|m| m.to_string()).collect();
        let periods: Vec<String> = MetricPeriod::ALL.iter().map(|p| p.to_string()).collect();
        json!({
            "type": "object",
            "properties": {
                "metric": { "type": "string", "enum": metrics },
                "period": { "type": "string", "enum": periods, "default": "month" }
            },
            "required": ["metric"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!(?input, "CalculateMetricTool::execute: called");
        let metric: BusinessMetric = required_str(&input, "metric")?
            .parse()
            .map_err(ToolError::InvalidArgument)?;
        let period = optional_parsed::<MetricPeriod>(&input, "period")?.unwrap_or_default();

        let value = compute_metric(&ctx.state, metric, period, ctx.today).await?;
        Ok(json!({
            "metric": metric,
            "period": period,
            "since": period.start(ctx.today),
            "value": value,
        }))
    }
}
