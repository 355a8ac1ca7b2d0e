//! Goal lifecycle and progress
//!
//! Goals start as drafts, become active when confirmed, and complete either
//! explicitly or once overall progress reaches 100%. Expiry is decided by the
//! backend; the tracker only reads the resulting status.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Goal, GoalStatus, MetricKind, MetricValues, PeriodType};
use crate::progress::{GoalProgress, goal_progress, goal_title, overall_progress};
use crate::state::{StateError, StateResponse};

/// Errors from goal operations
#[derive(Debug, Error)]
pub enum GoalError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Goal not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: goal {id} is {status}")]
    InvalidTransition { id: String, status: GoalStatus },

    #[error("Remote error: {0}")]
    Remote(#[from] StateError),
}

/// Persistence collaborator for goals
#[async_trait]
pub trait GoalRemote: Send + Sync {
    /// Persist a new goal, returning the canonical record
    async fn insert_goal(&self, goal: Goal) -> StateResponse<Goal>;

    async fn fetch_goal(&self, id: &str) -> StateResponse<Option<Goal>>;

    async fn save_goal(&self, goal: &Goal) -> StateResponse<()>;

    async fn fetch_goals(&self, status: Option<GoalStatus>) -> StateResponse<Vec<Goal>>;
}

/// Input for a new goal
#[derive(Debug, Clone, PartialEq)]
pub struct NewGoal {
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Generated from the period when absent
    pub title: Option<String>,
    pub target: MetricValues,
    pub ai_suggested: Option<MetricValues>,
}

/// Default date range for a period starting at `today`
///
/// Monthly and quarterly periods snap to calendar boundaries. Custom periods
/// have no default and return `None`.
pub fn period_bounds(period: PeriodType, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    match period {
        PeriodType::Weekly => Some((today, today + Duration::days(6))),
        PeriodType::Biweekly => Some((today, today + Duration::days(13))),
        PeriodType::Monthly => {
            let start = today.with_day(1)?;
            Some((start, last_day_of_month(start)?))
        }
        PeriodType::Quarterly => {
            let first_month = today.month0() / 3 * 3 + 1;
            let start = NaiveDate::from_ymd_opt(today.year(), first_month, 1)?;
            let last_month = NaiveDate::from_ymd_opt(today.year(), first_month + 2, 1)?;
            Some((start, last_day_of_month(last_month)?))
        }
        PeriodType::Custom => None,
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    next.pred_opt()
}

fn validate_values(values: &MetricValues, what: &str) -> Result<(), GoalError> {
    for kind in MetricKind::ALL {
        let value = values.get(kind);
        if !value.is_finite() || value < 0.0 {
            return Err(GoalError::Validation(format!("{} {} must be non-negative", what, kind)));
        }
    }
    Ok(())
}

/// Goal operations for one owner
pub struct GoalTracker<R: GoalRemote> {
    remote: Arc<R>,
    owner_id: String,
}

impl<R: GoalRemote> GoalTracker<R> {
    pub fn new(remote: Arc<R>, owner_id: impl Into<String>) -> Self {
        Self {
            remote,
            owner_id: owner_id.into(),
        }
    }

    async fn require(&self, id: &str) -> Result<Goal, GoalError> {
        self.remote
            .fetch_goal(id)
            .await?
            .ok_or_else(|| GoalError::NotFound(id.to_string()))
    }

    /// Create a goal in draft status
    pub async fn create_draft(&self, input: NewGoal) -> Result<Goal, GoalError> {
        debug!(period = %input.period_type, start = %input.start_date, end = %input.end_date, "create_draft: called");
        if input.start_date > input.end_date {
            return Err(GoalError::Validation(format!(
                "start date {} is after end date {}",
                input.start_date, input.end_date
            )));
        }
        validate_values(&input.target, "target")?;

        let title = match input.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(title) => title,
            None => goal_title(input.period_type, input.start_date, input.end_date),
        };
        let mut goal = Goal::draft(
            &self.owner_id,
            input.period_type,
            input.start_date,
            input.end_date,
            title,
            input.target,
        );
        goal.ai_suggested = input.ai_suggested;

        let goal = self.remote.insert_goal(goal).await?;
        info!(id = %goal.id, title = %goal.title, "Goal drafted");
        Ok(goal)
    }

    /// Promote a draft to active
    pub async fn confirm(&self, id: &str) -> Result<Goal, GoalError> {
        debug!(%id, "confirm: called");
        let mut goal = self.require(id).await?;
        if goal.status != GoalStatus::Draft {
            return Err(GoalError::InvalidTransition {
                id: id.to_string(),
                status: goal.status,
            });
        }
        goal.confirmed = true;
        goal.set_status(GoalStatus::Active);
        self.remote.save_goal(&goal).await?;
        info!(%id, "Goal confirmed");
        Ok(goal)
    }

    /// Set a metric's current value on an active goal
    ///
    /// Completes the goal when overall progress reaches 100%.
    pub async fn record_metric(&self, id: &str, kind: MetricKind, value: f64) -> Result<Goal, GoalError> {
        debug!(%id, %kind, value, "record_metric: called");
        if !value.is_finite() || value < 0.0 {
            return Err(GoalError::Validation(format!("{} must be non-negative", kind)));
        }
        let mut goal = self.require(id).await?;
        if goal.status != GoalStatus::Active {
            return Err(GoalError::InvalidTransition {
                id: id.to_string(),
                status: goal.status,
            });
        }

        goal.current.set(kind, value);
        if overall_progress(&goal) >= 100 {
            info!(%id, "Goal reached 100%, completing");
            goal.set_status(GoalStatus::Completed);
        } else {
            goal.updated_at = rowstore::now_ms();
        }
        self.remote.save_goal(&goal).await?;
        Ok(goal)
    }

    /// Explicitly complete an active goal
    pub async fn complete(&self, id: &str) -> Result<Goal, GoalError> {
        debug!(%id, "complete: called");
        let mut goal = self.require(id).await?;
        if goal.status != GoalStatus::Active {
            return Err(GoalError::InvalidTransition {
                id: id.to_string(),
                status: goal.status,
            });
        }
        goal.set_status(GoalStatus::Completed);
        self.remote.save_goal(&goal).await?;
        Ok(goal)
    }

    pub async fn progress(&self, id: &str, today: NaiveDate) -> Result<GoalProgress, GoalError> {
        debug!(%id, %today, "progress: called");
        let goal = self.require(id).await?;
        Ok(goal_progress(&goal, today))
    }

    pub async fn list(&self, status: Option<GoalStatus>) -> Result<Vec<Goal>, GoalError> {
        debug!(?status, "list: called");
        Ok(self.remote.fetch_goals(status).await?)
    }

    /// Progress of every active goal
    pub async fn active_progress(&self, today: NaiveDate) -> Result<Vec<GoalProgress>, GoalError> {
        let goals = self.list(Some(GoalStatus::Active)).await?;
        Ok(goals.iter().map(|g| goal_progress(g, today)).collect())
    }
}
