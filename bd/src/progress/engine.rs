//! Goal progress computation
//!
//! Pure functions over a goal's stored target/current pairs and the calendar.
//! Every function is total: division by zero yields 0 instead of an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Goal, MetricKind};

/// Where "today" sits inside a goal period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInfo {
    /// 1-based day of the period, clamped to `[1, total_days]`
    pub current_day: u32,
    /// Inclusive day count between start and end
    pub total_days: u32,
    pub days_remaining: u32,
    /// Share of the period elapsed, as an integer percentage
    pub percent_elapsed: u32,
}

/// Four-way classification of a metric against the linear expectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Behind,
    OnTrack,
    Ahead,
    Achieved,
}

impl std::fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Behind => write!(f, "behind"),
            Self::OnTrack => write!(f, "on_track"),
            Self::Ahead => write!(f, "ahead"),
            Self::Achieved => write!(f, "achieved"),
        }
    }
}

/// Progress of a single metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricProgress {
    pub kind: MetricKind,
    pub current: f64,
    pub target: f64,
    pub progress: f64,
    pub status: MetricStatus,
}

/// Display-ready progress breakdown for a goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal_id: String,
    pub title: String,
    pub days: DayInfo,
    pub expected: u32,
    pub metrics: Vec<MetricProgress>,
    pub overall: u32,
}

/// Position of `today` within `[start, end]`
pub fn day_info(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> DayInfo {
    let total_days = ((end - start).num_days() + 1).max(1) as u32;
    let elapsed = (today - start).num_days() + 1;
    let current_day = elapsed.clamp(1, i64::from(total_days)) as u32;

    // Nothing has elapsed before the period starts
    let percent_elapsed = if today < start {
        0
    } else {
        (f64::from(current_day) / f64::from(total_days) * 100.0).round() as u32
    };

    DayInfo {
        current_day,
        total_days,
        days_remaining: total_days - current_day,
        percent_elapsed,
    }
}

/// Share of the goal that should be done by now under linear progress
pub fn expected_progress(goal: &Goal, today: NaiveDate) -> u32 {
    day_info(goal.start_date, goal.end_date, today).percent_elapsed
}

/// Percentage of target reached, one decimal place, not clamped above 100
pub fn metric_progress(current: f64, target: f64) -> f64 {
    if target > 0.0 {
        (current / target * 1000.0).round() / 10.0
    } else {
        0.0
    }
}

/// Classify progress against the expected percentage
///
/// Evaluated in fixed priority order. With `expected == 0` every progress
/// value `>= 0` classifies as `Ahead`.
pub fn metric_status(progress: f64, expected: f64) -> MetricStatus {
    if progress >= 100.0 {
        MetricStatus::Achieved
    } else if progress >= expected * 0.9 {
        MetricStatus::Ahead
    } else if progress >= expected * 0.5 {
        MetricStatus::OnTrack
    } else {
        MetricStatus::Behind
    }
}

/// Rounded unweighted mean of the four metric progress values
pub fn overall_progress(goal: &Goal) -> u32 {
    let sum: f64 = MetricKind::ALL
        .iter()
        .map(|kind| {
            let (current, target) = goal.pair(*kind);
            metric_progress(current, target)
        })
        .sum();
    (sum / MetricKind::ALL.len() as f64).round().max(0.0) as u32
}

/// Full progress breakdown for display
pub fn goal_progress(goal: &Goal, today: NaiveDate) -> GoalProgress {
    let days = day_info(goal.start_date, goal.end_date, today);
    let expected = days.percent_elapsed;

    let metrics = MetricKind::ALL
        .iter()
        .map(|kind| {
            let (current, target) = goal.pair(*kind);
            let progress = metric_progress(current, target);
            MetricProgress {
                kind: *kind,
                current,
                target,
                progress,
                status: metric_status(progress, f64::from(expected)),
            }
        })
        .collect();

    GoalProgress {
        goal_id: goal.id.clone(),
        title: goal.title.clone(),
        days,
        expected,
        metrics,
        overall: overall_progress(goal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MetricValues, PeriodType};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january_goal() -> Goal {
        Goal::draft(
            "u1",
            PeriodType::Monthly,
            date(2024, 1, 1),
            date(2024, 1, 31),
            "Meta de Janeiro".to_string(),
            MetricValues {
                mrr: 100.0,
                new_clients: 10.0,
                tasks_completed: 50.0,
                projects_delivered: 4.0,
            },
        )
    }

    #[test]
    fn test_day_info_mid_period() {
        let info = day_info(date(2024, 1, 1), date(2024, 1, 31), date(2024, 1, 16));
        assert_eq!(info.current_day, 16);
        assert_eq!(info.total_days, 31);
        assert_eq!(info.days_remaining, 15);
        assert_eq!(info.percent_elapsed, 52);
    }

    #[test]
    fn test_day_info_clamped_outside_window() {
        let before = day_info(date(2024, 1, 1), date(2024, 1, 31), date(2023, 12, 20));
        assert_eq!(before.current_day, 1);
        assert_eq!(before.percent_elapsed, 0);
        assert_eq!(before.days_remaining, 30);

        let after = day_info(date(2024, 1, 1), date(2024, 1, 31), date(2024, 3, 1));
        assert_eq!(after.current_day, 31);
        assert_eq!(after.days_remaining, 0);
        assert_eq!(after.percent_elapsed, 100);
    }

    #[test]
    fn test_day_info_single_day_period() {
        let info = day_info(date(2024, 5, 5), date(2024, 5, 5), date(2024, 5, 5));
        assert_eq!(info.total_days, 1);
        assert_eq!(info.current_day, 1);
        assert_eq!(info.percent_elapsed, 100);
    }

    #[test]
    fn test_metric_progress() {
        assert_eq!(metric_progress(40.0, 100.0), 40.0);
        assert_eq!(metric_progress(1.0, 3.0), 33.3);
        assert_eq!(metric_progress(140.0, 100.0), 140.0);
        assert_eq!(metric_progress(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_metric_status_boundaries() {
        assert_eq!(metric_status(100.0, 80.0), MetricStatus::Achieved);
        assert_eq!(metric_status(100.0, 0.0), MetricStatus::Achieved);
        assert_eq!(metric_status(0.0, 0.0), MetricStatus::Ahead);
        assert_eq!(metric_status(5.0, 0.0), MetricStatus::Ahead);
        assert_eq!(metric_status(40.0, 52.0), MetricStatus::OnTrack);
        assert_eq!(metric_status(46.81, 52.0), MetricStatus::Ahead);
        assert_eq!(metric_status(46.8, 52.0), MetricStatus::OnTrack);
        assert_eq!(metric_status(25.9, 52.0), MetricStatus::Behind);
    }

    #[test]
    fn test_mid_january_scenario() {
        let mut goal = january_goal();
        goal.current.mrr = 40.0;
        let progress = goal_progress(&goal, date(2024, 1, 16));

        assert_eq!(progress.expected, 52);
        let mrr = progress.metrics.iter().find(|m| m.kind == MetricKind::Mrr).unwrap();
        assert_eq!(mrr.progress, 40.0);
        assert_eq!(mrr.status, MetricStatus::OnTrack);

        let clients = progress
            .metrics
            .iter()
            .find(|m| m.kind == MetricKind::NewClients)
            .unwrap();
        assert_eq!(clients.status, MetricStatus::Behind);
    }

    #[test]
    fn test_overall_progress_is_unweighted_mean() {
        let mut goal = january_goal();
        goal.current = MetricValues {
            mrr: 100.0,
            new_clients: 5.0,
            tasks_completed: 50.0,
            projects_delivered: 0.0,
        };
        // (100 + 50 + 100 + 0) / 4
        assert_eq!(overall_progress(&goal), 63);

        goal.current = goal.target;
        assert_eq!(overall_progress(&goal), 100);
    }

    #[test]
    fn test_expected_progress_uses_goal_dates() {
        let goal = january_goal();
        assert_eq!(expected_progress(&goal, date(2024, 1, 16)), 52);
        assert_eq!(expected_progress(&goal, date(2023, 1, 16)), 0);
    }

    proptest! {
        #[test]
        fn prop_metric_progress_recovers_current(current in 0.0f64..1_000_000.0, target in 0.01f64..1_000_000.0) {
            let progress = metric_progress(current, target);
            let recovered = progress / 100.0 * target;
            // One decimal place of percentage rounding
            prop_assert!((recovered - current).abs() <= 0.0005 * target + 1e-6);
        }

        #[test]
        fn prop_current_day_within_bounds(start in 0i64..3650, len in 0i64..400, offset in -500i64..1000) {
            let base = date(2020, 1, 1);
            let s = base + chrono::Duration::days(start);
            let e = s + chrono::Duration::days(len);
            let t = s + chrono::Duration::days(offset);
            let info = day_info(s, e, t);
            prop_assert!(info.current_day >= 1);
            prop_assert!(info.current_day <= info.total_days);
            prop_assert!(info.percent_elapsed <= 100);
            prop_assert_eq!(info.total_days as i64, len + 1);
        }

        #[test]
        fn prop_achieved_always_wins(progress in 100.0f64..10_000.0, expected in 0.0f64..100.0) {
            prop_assert_eq!(metric_status(progress, expected), MetricStatus::Achieved);
        }
    }
}
