//! Metrics snapshot export
//!
//! Stateless serializers: a snapshot goes in, text comes out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::{GoalStatus, ProspectQuery};
use crate::goals::GoalRemote;
use crate::metrics::BusinessSummary;
use crate::pipeline::{PipelineMetrics, PipelineRemote, PipelineState};
use crate::progress::{GoalProgress, goal_progress};
use crate::state::{StateManager, StateResponse};

const CSV_HEADER: &str = "section,metric,value";

/// Point-in-time view of the business
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub pipeline: PipelineMetrics,
    /// Active goals
    pub goals: Vec<GoalProgress>,
    pub business: BusinessSummary,
}

impl MetricsSnapshot {
    /// Gather a snapshot for the state manager's owner
    pub async fn collect(state: &StateManager, today: NaiveDate) -> StateResponse<Self> {
        debug!(owner_id = %state.owner_id(), %today, "MetricsSnapshot::collect: called");
        let stages = state.fetch_stages().await?;
        let prospects = state.fetch_prospects(&ProspectQuery::default()).await?;
        let goals = state
            .fetch_goals(Some(GoalStatus::Active))
            .await?
            .iter()
            .map(|g| goal_progress(g, today))
            .collect();

        Ok(Self {
            generated_at: Utc::now(),
            pipeline: PipelineMetrics::from_state(&PipelineState::new(stages, prospects)),
            goals,
            business: BusinessSummary::collect(state, today).await?,
        })
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Flat `section,metric,value` table
    pub fn to_csv(&self) -> String {
        let mut rows: Vec<(String, String, String)> = Vec::new();
        let mut push = |section: &str, metric: &str, value: String| {
            rows.push((section.to_string(), metric.to_string(), value));
        };

        push("snapshot", "generated_at", self.generated_at.to_rfc3339());

        let p = &self.pipeline;
        push("pipeline", "total_prospects", p.total_prospects.to_string());
        push("pipeline", "open_prospects", p.open_prospects.to_string());
        push("pipeline", "won_prospects", p.won_prospects.to_string());
        push("pipeline", "lost_prospects", p.lost_prospects.to_string());
        push("pipeline", "open_value", money(p.open_value));
        push("pipeline", "weighted_value", money(p.weighted_value));
        push("pipeline", "won_value", money(p.won_value));
        push("pipeline", "conversion_rate", format!("{:.1}", p.conversion_rate));

        let b = &self.business;
        push("business", "mrr", money(b.mrr));
        push("business", "active_clients", b.active_clients.to_string());
        push("business", "revenue_this_month", money(b.revenue_this_month));
        push("business", "pending_tasks", b.pending_tasks.to_string());
        push("business", "overdue_tasks", b.overdue_tasks.to_string());
        push("business", "tasks_completed_this_month", b.tasks_completed_this_month.to_string());

        for goal in &self.goals {
            let section = format!("goal:{}", goal.title);
            push(&section, "overall", goal.overall.to_string());
            push(&section, "expected", goal.expected.to_string());
            push(&section, "days_remaining", goal.days.days_remaining.to_string());
            for metric in &goal.metrics {
                push(&section, &format!("{}_progress", metric.kind), metric.progress.to_string());
                push(&section, &format!("{}_status", metric.kind), metric.status.to_string());
            }
        }

        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for (section, metric, value) in rows {
            out.push_str(&format!("{},{},{}\n", csv_field(&section), csv_field(&metric), csv_field(&value)));
        }
        out
    }
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Quote a field when it contains a separator, quote or newline
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
