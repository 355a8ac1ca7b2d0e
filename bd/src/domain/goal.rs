//! Goal domain type
//!
//! A performance target for a bounded period with four tracked metrics.

use chrono::NaiveDate;
use rowstore::{IndexValue, Record, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::id::generate_id;

/// Length of a goal period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Custom,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weekly => write!(f, "weekly"),
            Self::Biweekly => write!(f, "biweekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown period type: {}", s)),
        }
    }
}

/// Goal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Expired,
}

impl GoalStatus {
    /// Completed and expired goals no longer accrue progress
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown goal status: {}", s)),
        }
    }
}

/// The four tracked metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mrr,
    NewClients,
    TasksCompleted,
    ProjectsDelivered,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Mrr,
        MetricKind::NewClients,
        MetricKind::TasksCompleted,
        MetricKind::ProjectsDelivered,
    ];
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mrr => write!(f, "mrr"),
            Self::NewClients => write!(f, "new_clients"),
            Self::TasksCompleted => write!(f, "tasks_completed"),
            Self::ProjectsDelivered => write!(f, "projects_delivered"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "mrr" => Ok(Self::Mrr),
            "new_clients" | "clients" => Ok(Self::NewClients),
            "tasks_completed" | "tasks" => Ok(Self::TasksCompleted),
            "projects_delivered" | "projects" => Ok(Self::ProjectsDelivered),
            _ => Err(format!("Unknown metric: {}", s)),
        }
    }
}

/// One value per tracked metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub mrr: f64,
    pub new_clients: f64,
    pub tasks_completed: f64,
    pub projects_delivered: f64,
}

impl MetricValues {
    pub fn get(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Mrr => self.mrr,
            MetricKind::NewClients => self.new_clients,
            MetricKind::TasksCompleted => self.tasks_completed,
            MetricKind::ProjectsDelivered => self.projects_delivered,
        }
    }

    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::Mrr => self.mrr = value,
            MetricKind::NewClients => self.new_clients = value,
            MetricKind::TasksCompleted => self.tasks_completed = value,
            MetricKind::ProjectsDelivered => self.projects_delivered = value,
        }
    }
}

/// A performance target for a bounded period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub owner_id: String,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub title: String,
    pub target: MetricValues,
    pub current: MetricValues,
    /// Advisory values proposed by the AI manager, never enforced
    pub ai_suggested: Option<MetricValues>,
    pub confirmed: bool,
    pub status: GoalStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Goal {
    /// Create a draft goal; callers validate the date range first
    pub fn draft(
        owner_id: &str,
        period_type: PeriodType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        title: String,
        target: MetricValues,
    ) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("goal", &title),
            owner_id: owner_id.to_string(),
            period_type,
            start_date,
            end_date,
            title,
            target,
            current: MetricValues::default(),
            ai_suggested: None,
            confirmed: false,
            status: GoalStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current and target for one metric
    pub fn pair(&self, kind: MetricKind) -> (f64, f64) {
        (self.current.get(kind), self.target.get(kind))
    }

    pub fn set_status(&mut self, status: GoalStatus) {
        self.status = status;
        self.updated_at = now_ms();
    }
}

impl Record for Goal {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "goals"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields.insert("period_type".to_string(), IndexValue::String(self.period_type.to_string()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_values_get_set() {
        let mut values = MetricValues::default();
        for (i, kind) in MetricKind::ALL.iter().enumerate() {
            values.set(*kind, i as f64 + 1.0);
        }
        assert_eq!(values.mrr, 1.0);
        assert_eq!(values.projects_delivered, 4.0);
        assert_eq!(values.get(MetricKind::NewClients), 2.0);
    }

    #[test]
    fn test_metric_kind_aliases() {
        assert_eq!("new-clients".parse::<MetricKind>().unwrap(), MetricKind::NewClients);
        assert_eq!("tasks".parse::<MetricKind>().unwrap(), MetricKind::TasksCompleted);
        assert!("revenue".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_closed_statuses() {
        assert!(!GoalStatus::Draft.is_closed());
        assert!(!GoalStatus::Active.is_closed());
        assert!(GoalStatus::Completed.is_closed());
        assert!(GoalStatus::Expired.is_closed());
    }

    #[test]
    fn test_goal_serde_snake_case() {
        let goal = Goal::draft(
            "u1",
            PeriodType::Monthly,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            "Meta de Janeiro".to_string(),
            MetricValues::default(),
        );
        let json = serde_json::to_value(&goal).unwrap();
        assert_eq!(json["period_type"], "monthly");
        assert_eq!(json["status"], "draft");
        assert_eq!(json["start_date"], "2024-01-01");
    }
}
