//! Progress engine
//!
//! Computes where a goal stands relative to linear expectations over its
//! period, and produces default titles for new goals.

mod engine;
mod title;

pub use engine::{
    DayInfo, GoalProgress, MetricProgress, MetricStatus, day_info, expected_progress, goal_progress, metric_progress,
    metric_status, overall_progress,
};
pub use title::{goal_title, goal_title_for};
