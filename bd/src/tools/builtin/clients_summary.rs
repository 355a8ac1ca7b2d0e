//! get_clients_summary - client counts, MRR and top accounts

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Client, ClientStatus};
use crate::tools::{Tool, ToolContext, ToolError};

const TOP_CLIENTS: usize = 5;

pub struct ClientsSummaryTool;

#[async_trait]
impl Tool for ClientsSummaryTool {
    fn name(&self) -> &'static str {
        "get_clients_summary"
    }

    fn description(&self) -> &'static str {
        "Summarize the owner's clients: active and inactive counts, total MRR and the largest accounts."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        debug!("ClientsSummaryTool::execute: called");
        let clients = ctx.state.list_owned::<Client>(vec![]).await?;
        let mut active: Vec<&Client> = clients.iter().filter(|c| c.status == ClientStatus::Active).collect();
        active.sort_by(|a, b| b.mrr.total_cmp(&a.mrr));

        let mrr: f64 = active.iter().map(|c| c.mrr).sum();
        let average_mrr = if active.is_empty() { 0.0 } else { mrr / active.len() as f64 };
        Ok(json!({
            "total": clients.len(),
            "active": active.len(),
            "inactive": clients.len() - active.len(),
            "mrr": mrr,
            "average_mrr": average_mrr,
            "converted_from_pipeline": clients.iter().filter(|c| c.prospect_id.is_some()).count(),
            "top_clients": active.iter().take(TOP_CLIENTS).map(|c| json!({
                "id": c.id,
                "name": c.name,
                "company": c.company,
                "mrr": c.mrr,
            })).collect::<Vec<_>>(),
        }))
    }
}
