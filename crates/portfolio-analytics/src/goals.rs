//! Goal pacing.
//!
//! A goal is on pace when the funded share of the target keeps up with the elapsed
//! share of its timeline, give or take a tolerance.

use chrono::{DateTime, Utc};
use finance_core::{Alert, AlertSeverity, AlertType, Goal};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPace {
    /// Fraction of the timeline already used, in [0, 1]
    pub elapsed: f64,
    /// Fraction of the target already funded
    pub progress: f64,
    /// Amount reached by the deadline at the current pace
    pub projected_amount: f64,
}

impl GoalPace {
    pub fn shortfall(&self) -> f64 {
        self.elapsed - self.progress
    }
}

pub fn goal_pace(goal: &Goal, now: DateTime<Utc>) -> GoalPace {
    let span = (goal.deadline - goal.start_date).num_seconds();
    let elapsed = if span > 0 {
        ((now - goal.start_date).num_seconds() as f64 / span as f64).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let progress = if goal.target_amount > 0.0 {
        goal.current_amount / goal.target_amount
    } else {
        1.0
    };
    let projected_amount = if elapsed > 0.0 {
        goal.current_amount / elapsed
    } else {
        goal.target_amount
    };

    GoalPace {
        elapsed,
        progress,
        projected_amount,
    }
}

/// Alert for a goal that is behind pace or past its deadline. `None` when the goal
/// is funded, on pace, or malformed.
pub fn assess_goal(goal: &Goal, now: DateTime<Utc>, tolerance: f64) -> Option<Alert> {
    if !goal.target_amount.is_finite() || goal.target_amount <= 0.0 || !goal.current_amount.is_finite() {
        return None;
    }
    if goal.current_amount >= goal.target_amount {
        return None;
    }

    let pace = goal_pace(goal, now);
    let metadata = json!({
        "goal": goal.name,
        "targetAmount": goal.target_amount,
        "currentAmount": goal.current_amount,
        "deadline": goal.deadline,
        "elapsed": pace.elapsed,
        "progress": pace.progress,
        "projectedAmount": pace.projected_amount,
    });

    if now >= goal.deadline {
        let message = format!(
            "The deadline for \"{}\" has passed with {:.0} of {:.0} saved ({:.0}%).",
            goal.name,
            goal.current_amount,
            goal.target_amount,
            pace.progress * 100.0
        );
        return Some(
            Alert::new(AlertType::GoalAlert, AlertSeverity::Critical, format!("Goal missed: {}", goal.name), message)
                .with_metric(format!("goal:{}", goal.name))
                .with_metadata(metadata),
        );
    }

    if pace.progress >= pace.elapsed * (1.0 - tolerance) {
        return None;
    }

    let severity = match pace.shortfall() {
        s if s > 0.5 => AlertSeverity::High,
        s if s > 0.25 => AlertSeverity::Medium,
        _ => AlertSeverity::Low,
    };
    let message = format!(
        "\"{}\" is {:.0}% funded with {:.0}% of the time used. At this pace it reaches {:.0} of {:.0} by {}.",
        goal.name,
        pace.progress * 100.0,
        pace.elapsed * 100.0,
        pace.projected_amount,
        goal.target_amount,
        goal.deadline.format("%Y-%m-%d")
    );

    Some(
        Alert::new(AlertType::GoalAlert, severity, format!("Goal behind schedule: {}", goal.name), message)
            .with_metric(format!("goal:{}", goal.name))
            .with_metadata(metadata),
    )
}

pub fn goal_alerts(goals: &[Goal], now: DateTime<Utc>, tolerance: f64) -> Vec<Alert> {
    goals
        .iter()
        .filter_map(|goal| assess_goal(goal, now, tolerance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use finance_core::GoalPriority;

    fn goal(current: f64, target: f64) -> Goal {
        Goal {
            name: "House".into(),
            target_amount: target,
            current_amount: current,
            start_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            deadline: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
            priority: GoalPriority::High,
        }
    }

    fn halfway() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::days(365) / 2
    }

    #[test]
    fn test_funded_goal_is_skipped() {
        assert!(assess_goal(&goal(100.0, 100.0), halfway(), 0.1).is_none());
        assert!(assess_goal(&goal(150.0, 100.0), halfway() + Duration::days(400), 0.1).is_none());
    }

    #[test]
    fn test_within_tolerance_is_on_pace() {
        // 46% funded at 50% elapsed: 0.46 >= 0.5 * 0.9
        assert!(assess_goal(&goal(46.0, 100.0), halfway(), 0.1).is_none());
    }

    #[test]
    fn test_behind_pace_severity() {
        let low = assess_goal(&goal(40.0, 100.0), halfway(), 0.1).unwrap();
        assert_eq!(low.severity, AlertSeverity::Low);
        assert_eq!(low.alert_type, AlertType::GoalAlert);
        assert_eq!(low.related_metric.as_deref(), Some("goal:House"));
        assert!(low.message.contains("reaches 80 of 100"), "{}", low.message);

        let medium = assess_goal(&goal(20.0, 100.0), halfway(), 0.1).unwrap();
        assert_eq!(medium.severity, AlertSeverity::Medium);

        let near_end = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();
        let high = assess_goal(&goal(10.0, 100.0), near_end, 0.1).unwrap();
        assert_eq!(high.severity, AlertSeverity::High);
    }

    #[test]
    fn test_missed_deadline_is_critical() {
        let after = Utc.with_ymd_and_hms(2027, 2, 1, 0, 0, 0).unwrap();
        let alert = assess_goal(&goal(90.0, 100.0), after, 0.1).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert!(alert.title.starts_with("Goal missed"));
    }

    #[test]
    fn test_not_started_goal_projects_target() {
        let before = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap();
        let pace = goal_pace(&goal(0.0, 100.0), before);
        assert_eq!(pace.elapsed, 0.0);
        assert_eq!(pace.projected_amount, 100.0);
        assert!(assess_goal(&goal(0.0, 100.0), before, 0.1).is_none());
    }

    #[test]
    fn test_malformed_goals_are_ignored() {
        assert!(goal_alerts(&[goal(0.0, 0.0), goal(f64::NAN, 10.0)], halfway(), 0.1).is_empty());
    }
}
