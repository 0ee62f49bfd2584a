use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PriceDrop,
    VolatilitySpike,
    HealthScoreChange,
    GoalAlert,
    Rebalance,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PriceDrop => "price_drop",
            AlertType::VolatilitySpike => "volatility_spike",
            AlertType::HealthScoreChange => "health_score_change",
            AlertType::GoalAlert => "goal_alert",
            AlertType::Rebalance => "rebalance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Map a detector confidence in [0, 1] onto a severity.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.8 {
            AlertSeverity::High
        } else if confidence > 0.6 {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A user-facing notification produced by an alert check.
///
/// Alerts are a historical record: after creation only `is_read` and
/// `action_taken` change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub related_asset: Option<String>,
    #[serde(default)]
    pub related_metric: Option<String>,
    #[serde(default)]
    pub old_value: Option<f64>,
    #[serde(default)]
    pub new_value: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub action_taken: bool,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dedup_key: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id: String::new(),
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            related_asset: None,
            related_metric: None,
            old_value: None,
            new_value: None,
            change_percent: None,
            is_read: false,
            action_taken: false,
            metadata: None,
            created_at: Utc::now(),
            dedup_key: String::new(),
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.related_asset = Some(asset.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.related_metric = Some(metric.into());
        self
    }

    pub fn with_change(mut self, old_value: f64, new_value: f64, change_percent: f64) -> Self {
        self.old_value = Some(old_value);
        self.new_value = Some(new_value);
        self.change_percent = Some(change_percent);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Idempotency key: `type:subject:bucket`, where the bucket is the creation time
    /// floored to `window`.
    pub fn compute_dedup_key(&self, window: Duration) -> String {
        let subject = self
            .related_asset
            .as_deref()
            .or(self.related_metric.as_deref())
            .unwrap_or(&self.title);
        let window_secs = window.num_seconds().max(1);
        let bucket = self.created_at.timestamp().div_euclid(window_secs);
        format!("{}:{}:{}", self.alert_type.as_str(), subject, bucket)
    }
}

/// Filter for listing a user's alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertQuery {
    pub limit: usize,
    pub unread_only: bool,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            unread_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_severity_from_confidence() {
        assert_eq!(AlertSeverity::from_confidence(0.95), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_confidence(0.8), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_confidence(0.61), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_confidence(0.6), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_confidence(0.0), AlertSeverity::Low);
    }

    #[test]
    fn test_dedup_key_buckets_by_window() {
        let mut a = Alert::new(AlertType::Rebalance, AlertSeverity::Medium, "Concentrated", "msg")
            .with_metric("sector:tech");
        a.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 1, 0, 0).unwrap();
        let mut b = a.clone();
        b.created_at = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let mut c = a.clone();
        c.created_at = Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap();

        let day = Duration::hours(24);
        assert_eq!(a.compute_dedup_key(day), b.compute_dedup_key(day));
        assert_ne!(a.compute_dedup_key(day), c.compute_dedup_key(day));
        assert!(a.compute_dedup_key(day).starts_with("rebalance:sector:tech:"));
    }

    #[test]
    fn test_alert_serializes_type_field() {
        let a = Alert::new(AlertType::PriceDrop, AlertSeverity::High, "t", "m");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "price_drop");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["isRead"], false);
    }
}
