//! Business metrics over the owner's records
//!
//! Shared by the `calculate_metric` tool, the briefing context and exports.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Client, ClientStatus, Filter, Payment, Prospect, ProspectStatus, Task, TaskStatus};
use crate::state::{StateManager, StateResponse};

/// Metrics the assistant can compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessMetric {
    /// Payments received in the period
    Revenue,
    /// Monthly recurring revenue of active clients
    Mrr,
    NewClients,
    TasksCompleted,
    /// Open tasks, regardless of period
    PendingTasks,
    /// Expected value of open prospects
    PipelineValue,
}

impl BusinessMetric {
    pub const ALL: [BusinessMetric; 6] = [
        Self::Revenue,
        Self::Mrr,
        Self::NewClients,
        Self::TasksCompleted,
        Self::PendingTasks,
        Self::PipelineValue,
    ];
}

impl std::fmt::Display for BusinessMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revenue => write!(f, "revenue"),
            Self::Mrr => write!(f, "mrr"),
            Self::NewClients => write!(f, "new_clients"),
            Self::TasksCompleted => write!(f, "tasks_completed"),
            Self::PendingTasks => write!(f, "pending_tasks"),
            Self::PipelineValue => write!(f, "pipeline_value"),
        }
    }
}

impl std::str::FromStr for BusinessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.to_string() == s)
            .ok_or_else(|| format!("Unknown metric: {}", s))
    }
}

/// Reporting window ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricPeriod {
    Today,
    /// Since Monday
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl MetricPeriod {
    pub const ALL: [MetricPeriod; 5] = [Self::Today, Self::Week, Self::Month, Self::Quarter, Self::Year];

    /// First day of the window containing `today`
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        let first_of = |month: u32| NaiveDate::from_ymd_opt(today.year(), month, 1).unwrap_or(today);
        match self {
            Self::Today => today,
            Self::Week => today - Duration::days(today.weekday().num_days_from_monday() as i64),
            Self::Month => first_of(today.month()),
            Self::Quarter => first_of(today.month0() / 3 * 3 + 1),
            Self::Year => first_of(1),
        }
    }

    /// Window start as epoch milliseconds (UTC midnight)
    pub fn start_ms(&self, today: NaiveDate) -> i64 {
        self.start(today)
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(0)
    }
}

impl std::fmt::Display for MetricPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Quarter => write!(f, "quarter"),
            Self::Year => write!(f, "year"),
        }
    }
}

impl std::str::FromStr for MetricPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| format!("Unknown period: {}", s))
    }
}

/// Compute one metric for the state manager's owner
pub async fn compute_metric(
    state: &StateManager,
    metric: BusinessMetric,
    period: MetricPeriod,
    today: NaiveDate,
) -> StateResponse<f64> {
    debug!(%metric, %period, %today, "compute_metric: called");
    let since = period.start_ms(today);

    let value = match metric {
        BusinessMetric::Revenue => state
            .list_owned::<Payment>(vec![])
            .await?
            .iter()
            .filter(|p| p.paid_at >= since)
            .map(|p| p.amount)
            .sum(),
        BusinessMetric::Mrr => active_mrr(&state.list_owned::<Client>(vec![]).await?),
        BusinessMetric::NewClients => state
            .list_owned::<Client>(vec![])
            .await?
            .iter()
            .filter(|c| c.created_at >= since)
            .count() as f64,
        BusinessMetric::TasksCompleted => state
            .list_owned::<Task>(vec![Filter::eq("status", TaskStatus::Done.to_string())])
            .await?
            .iter()
            .filter(|t| t.completed_at.is_some_and(|at| at >= since))
            .count() as f64,
        BusinessMetric::PendingTasks => state
            .list_owned::<Task>(vec![])
            .await?
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .count() as f64,
        BusinessMetric::PipelineValue => state
            .list_owned::<Prospect>(vec![])
            .await?
            .iter()
            .filter(|p| p.status == ProspectStatus::Open)
            .map(|p| p.expected_value)
            .sum(),
    };
    Ok(value)
}

fn active_mrr(clients: &[Client]) -> f64 {
    clients
        .iter()
        .filter(|c| c.status == ClientStatus::Active)
        .map(|c| c.mrr)
        .sum()
}

/// Headline numbers for briefings and exports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessSummary {
    pub mrr: f64,
    pub active_clients: usize,
    pub revenue_this_month: f64,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub tasks_completed_this_month: usize,
}

impl BusinessSummary {
    pub async fn collect(state: &StateManager, today: NaiveDate) -> StateResponse<Self> {
        debug!(%today, "BusinessSummary::collect: called");
        let month_start = MetricPeriod::Month.start_ms(today);
        let clients = state.list_owned::<Client>(vec![]).await?;
        let tasks = state.list_owned::<Task>(vec![]).await?;
        let payments = state.list_owned::<Payment>(vec![]).await?;

        Ok(Self {
            mrr: active_mrr(&clients),
            active_clients: clients.iter().filter(|c| c.status == ClientStatus::Active).count(),
            revenue_this_month: payments
                .iter()
                .filter(|p| p.paid_at >= month_start)
                .map(|p| p.amount)
                .sum(),
            pending_tasks: tasks.iter().filter(|t| t.status != TaskStatus::Done).count(),
            overdue_tasks: tasks.iter().filter(|t| t.is_overdue(today)).count(),
            tasks_completed_this_month: tasks
                .iter()
                .filter(|t| t.completed_at.is_some_and(|at| at >= month_start))
                .count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowstore::now_ms;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_start() {
        // 2024-05-16 is a Thursday
        let today = date(2024, 5, 16);
        assert_eq!(MetricPeriod::Today.start(today), today);
        assert_eq!(MetricPeriod::Week.start(today), date(2024, 5, 13));
        assert_eq!(MetricPeriod::Month.start(today), date(2024, 5, 1));
        assert_eq!(MetricPeriod::Quarter.start(today), date(2024, 4, 1));
        assert_eq!(MetricPeriod::Year.start(today), date(2024, 1, 1));
    }

    #[test]
    fn test_metric_names_parse() {
        for metric in BusinessMetric::ALL {
            assert_eq!(metric.to_string().parse::<BusinessMetric>().unwrap(), metric);
        }
        assert!("churn".parse::<BusinessMetric>().is_err());
        assert_eq!("quarter".parse::<MetricPeriod>().unwrap(), MetricPeriod::Quarter);
    }

    #[tokio::test]
    async fn test_compute_metrics() {
        let state = StateManager::spawn_in_memory("u1").unwrap();
        let today = chrono::Utc::now().date_naive();

        let mut acme = Client::new("u1", "Acme");
        acme.mrr = 1200.0;
        state.create(&acme).await.unwrap();
        let mut gone = Client::new("u1", "Gone");
        gone.mrr = 500.0;
        gone.status = ClientStatus::Inactive;
        state.create(&gone).await.unwrap();

        state.create(&Payment::new("u1", 300.0, now_ms())).await.unwrap();
        state.create(&Payment::new("u1", 999.0, 0)).await.unwrap();

        let mut done = Task::new("u1", "Enviar proposta");
        done.status = TaskStatus::Done;
        done.completed_at = Some(now_ms());
        state.create(&done).await.unwrap();
        state.create(&Task::new("u1", "Ligar")).await.unwrap();

        let get = |m| compute_metric(&state, m, MetricPeriod::Month, today);
        assert_eq!(get(BusinessMetric::Mrr).await.unwrap(), 1200.0);
        assert_eq!(get(BusinessMetric::Revenue).await.unwrap(), 300.0);
        assert_eq!(get(BusinessMetric::NewClients).await.unwrap(), 2.0);
        assert_eq!(get(BusinessMetric::TasksCompleted).await.unwrap(), 1.0);
        assert_eq!(get(BusinessMetric::PendingTasks).await.unwrap(), 1.0);
        assert_eq!(get(BusinessMetric::PipelineValue).await.unwrap(), 0.0);

        let summary = BusinessSummary::collect(&state, today).await.unwrap();
        assert_eq!(summary.active_clients, 1);
        assert_eq!(summary.pending_tasks, 1);
        assert_eq!(summary.revenue_this_month, 300.0);
    }
}
