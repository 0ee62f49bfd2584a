//! Alert generation and the alert inbox.

use chrono::{Duration, Utc};
use finance_core::{
    Alert, AlertQuery, AlertSeverity, AlertType, AnalysisSnapshot, FinanceError, FinanceResult,
    PortfolioMetrics,
};
use intelligence_client::{Anomaly, IntelligenceProvider};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::{PortfolioAnalysis, PortfolioAnalyzer};
use crate::config::EngineConfig;
use crate::goals::goal_alerts;

pub const METRIC_HEALTH_SCORE: &str = "health_score";
pub const METRIC_TOTAL_VALUE: &str = "total_value";

fn percent_change(old: f64, new: f64) -> Option<f64> {
    if old > 0.0 && new.is_finite() {
        Some((new - old) / old * 100.0)
    } else {
        None
    }
}

/// Compare the current analysis with the previous snapshot.
///
/// `threshold` is a percentage. Health moves in either direction alert; total value
/// only alerts on a fall. Nothing is emitted without a previous snapshot.
pub fn change_alerts(previous: Option<&AnalysisSnapshot>, analysis: &PortfolioAnalysis, threshold: f64) -> Vec<Alert> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    let mut alerts = Vec::new();

    let health = analysis.health_score as f64;
    if let Some(change) = percent_change(previous.health_score, health) {
        if change.abs() >= threshold {
            let severity = if change.abs() >= threshold * 2.0 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            let (title, verb) = if change < 0.0 {
                ("Health score dropped", "fell")
            } else {
                ("Health score improved", "rose")
            };
            alerts.push(
                Alert::new(
                    AlertType::HealthScoreChange,
                    severity,
                    title,
                    format!(
                        "Your financial health score {} from {:.0} to {:.0} ({:+.1}%).",
                        verb, previous.health_score, health, change
                    ),
                )
                .with_metric(METRIC_HEALTH_SCORE)
                .with_change(previous.health_score, health, change),
            );
        }
    }

    let value = analysis.basic_metrics.total_value;
    if let Some(change) = percent_change(previous.total_value, value) {
        if change <= -threshold {
            let severity = if change <= -threshold * 2.0 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            alerts.push(
                Alert::new(
                    AlertType::PriceDrop,
                    severity,
                    "Portfolio value dropped",
                    format!(
                        "Total value fell from {:.2} to {:.2} ({:.1}%).",
                        previous.total_value, value, change
                    ),
                )
                .with_metric(METRIC_TOTAL_VALUE)
                .with_change(previous.total_value, value, change),
            );
        }
    }

    alerts
}

/// Rebalance alerts for every sector above `max_percent` of the portfolio. Portfolios
/// with a single holding are concentrated by construction and never alert.
pub fn concentration_alerts(metrics: &PortfolioMetrics, max_percent: f64) -> Vec<Alert> {
    if metrics.number_of_holdings < 2 {
        return Vec::new();
    }

    metrics
        .sector_allocation
        .iter()
        .filter(|(_, pct)| **pct > max_percent)
        .map(|(sector, pct)| {
            let severity = if *pct >= (max_percent * 2.0).min(100.0) {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            Alert::new(
                AlertType::Rebalance,
                severity,
                format!("High concentration in {}", sector),
                format!(
                    "{} makes up {:.1}% of your portfolio, above the {:.0}% limit. Consider rebalancing.",
                    sector, pct, max_percent
                ),
            )
            .with_metric(format!("sector:{}", sector))
            .with_metadata(json!({ "sector": sector, "allocation": pct, "limit": max_percent }))
        })
        .collect()
}

pub fn anomaly_alerts(anomalies: &[Anomaly]) -> Vec<Alert> {
    anomalies
        .iter()
        .map(|anomaly| {
            let mut alert = Alert::new(
                AlertType::VolatilitySpike,
                AlertSeverity::from_confidence(anomaly.confidence),
                format!("Unusual activity detected in {}", anomaly.asset),
                anomaly.description.clone(),
            )
            .with_asset(anomaly.asset.clone());
            alert.metadata = serde_json::to_value(anomaly).ok();
            alert
        })
        .collect()
}

/// Stamp dedup keys and drop repeats within the batch, keeping the first.
pub fn dedup_batch(alerts: Vec<Alert>, window: Duration) -> Vec<Alert> {
    let mut seen = HashSet::new();
    alerts
        .into_iter()
        .filter_map(|mut alert| {
            alert.dedup_key = alert.compute_dedup_key(window);
            seen.insert(alert.dedup_key.clone()).then_some(alert)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInbox {
    pub alerts: Vec<Alert>,
    pub unread_count: usize,
}

pub struct AlertGenerator {
    analyzer: PortfolioAnalyzer,
    intelligence: Arc<dyn IntelligenceProvider>,
    config: EngineConfig,
}

impl AlertGenerator {
    pub fn new(analyzer: PortfolioAnalyzer, config: EngineConfig) -> Self {
        let intelligence = analyzer.intelligence().clone();
        Self {
            analyzer,
            intelligence,
            config,
        }
    }

    /// Run every detector and persist the new alerts as one batch.
    ///
    /// Returns only the alerts actually stored; repeats of an alert already raised in
    /// the current dedup window are dropped. The analysis is then recorded as the
    /// snapshot the next check compares against; the alerts are already stored at that
    /// point, so a failed snapshot write is only logged.
    pub async fn check_portfolio_alerts(&self, user_id: &str) -> FinanceResult<Vec<Alert>> {
        let analysis = self.analyzer.analyze(user_id).await?;
        let store = self.analyzer.store();
        let user = store
            .find_user(user_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("user {}", user_id)))?;

        let threshold = Some(user.preferences.alert_threshold)
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(self.config.default_alert_threshold);
        let history = store
            .snapshot_history(user_id, self.config.snapshot_history_limit)
            .await?;

        let mut alerts = change_alerts(history.first(), &analysis, threshold);
        alerts.extend(concentration_alerts(
            &analysis.basic_metrics,
            self.config.max_sector_concentration,
        ));
        alerts.extend(self.detect_anomalies(&analysis, &history).await);
        alerts.extend(goal_alerts(&user.goals, Utc::now(), self.config.goal_pace_tolerance));

        let batch = dedup_batch(alerts, self.config.dedup_window());
        let inserted = if batch.is_empty() {
            Vec::new()
        } else {
            store.insert_alerts(user_id, &batch).await?
        };

        if let Err(e) = store.save_snapshot(&analysis.snapshot()).await {
            warn!("Failed to record analysis snapshot for {}: {}", user_id, e);
        }
        info!(
            "Alert check for {}: {} candidates, {} new",
            user_id,
            batch.len(),
            inserted.len()
        );
        Ok(inserted)
    }

    /// Anomalies are best effort: a failing service yields none.
    async fn detect_anomalies(&self, analysis: &PortfolioAnalysis, history: &[AnalysisSnapshot]) -> Vec<Alert> {
        match self
            .intelligence
            .detect_anomalies(&analysis.portfolio.holdings, history)
            .await
        {
            Ok(anomalies) => {
                debug!("{} anomalies for {}", anomalies.len(), analysis.portfolio.user_id);
                anomaly_alerts(&anomalies)
            }
            Err(e) => {
                warn!(
                    "Anomaly detection failed for {}, continuing without: {}",
                    analysis.portfolio.user_id, e
                );
                Vec::new()
            }
        }
    }

    pub async fn list_alerts(&self, user_id: &str, query: AlertQuery) -> FinanceResult<AlertInbox> {
        let store = self.analyzer.store();
        let alerts = store.list_alerts(user_id, query).await?;
        let unread_count = store.count_unread_alerts(user_id).await?;
        Ok(AlertInbox { alerts, unread_count })
    }

    pub async fn mark_read(&self, user_id: &str, alert_id: i64) -> FinanceResult<()> {
        if !self.analyzer.store().mark_alert_read(user_id, alert_id).await? {
            return Err(FinanceError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    pub async fn mark_actioned(&self, user_id: &str, alert_id: i64) -> FinanceResult<()> {
        if !self.analyzer.store().mark_alert_actioned(user_id, alert_id).await? {
            return Err(FinanceError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: &str) -> FinanceResult<u64> {
        let updated = self.analyzer.store().mark_all_alerts_read(user_id).await?;
        debug!("Marked {} alerts read for {}", updated, user_id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finance_core::Portfolio;
    use intelligence_client::AnalysisResponse;
    use std::collections::BTreeMap;

    fn analysis(health: u8, value: f64) -> PortfolioAnalysis {
        PortfolioAnalysis {
            portfolio: Portfolio::new("u1"),
            basic_metrics: PortfolioMetrics {
                total_value: value,
                ..Default::default()
            },
            intelligence: AnalysisResponse::default(),
            health_score: health,
            health_band: crate::health::HealthBand::from_score(health as f64),
            risk_score: None,
            timestamp: Utc::now(),
        }
    }

    fn snapshot(health: f64, value: f64) -> AnalysisSnapshot {
        AnalysisSnapshot {
            user_id: "u1".into(),
            health_score: health,
            total_value: value,
            diversification_score: 50.0,
            risk_score: None,
            taken_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_previous_snapshot_no_change_alerts() {
        assert!(change_alerts(None, &analysis(40, 10.0), 5.0).is_empty());
    }

    #[test]
    fn test_health_and_value_changes() {
        let previous = snapshot(80.0, 100_000.0);

        let alerts = change_alerts(Some(&previous), &analysis(70, 88_000.0), 5.0);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].alert_type, AlertType::HealthScoreChange);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert_eq!(alerts[0].old_value, Some(80.0));
        assert_eq!(alerts[0].new_value, Some(70.0));
        assert_eq!(alerts[1].alert_type, AlertType::PriceDrop);
        assert_eq!(alerts[1].related_metric.as_deref(), Some(METRIC_TOTAL_VALUE));
        assert_eq!(alerts[1].severity, AlertSeverity::High);

        // small moves and value gains stay quiet
        assert!(change_alerts(Some(&previous), &analysis(79, 130_000.0), 5.0).is_empty());
    }

    #[test]
    fn test_concentration_needs_two_holdings() {
        let mut metrics = PortfolioMetrics {
            sector_allocation: BTreeMap::from([("tech".to_string(), 100.0)]),
            number_of_holdings: 1,
            ..Default::default()
        };
        assert!(concentration_alerts(&metrics, 40.0).is_empty());

        metrics.number_of_holdings = 3;
        let alerts = concentration_alerts(&metrics, 40.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Rebalance);
        assert_eq!(alerts[0].related_metric.as_deref(), Some("sector:tech"));
    }

    #[test]
    fn test_anomaly_severity_mapping() {
        let anomaly = |asset: &str, confidence: f64| Anomaly {
            asset: asset.into(),
            confidence,
            description: "spike".into(),
            extra: Default::default(),
        };
        let alerts = anomaly_alerts(&[anomaly("INFY", 0.9), anomaly("TCS", 0.7), anomaly("WIPRO", 0.6)]);
        let severities: Vec<_> = alerts.iter().map(|a| a.severity).collect();
        assert_eq!(severities, vec![AlertSeverity::High, AlertSeverity::Medium, AlertSeverity::Low]);
        assert_eq!(alerts[0].title, "Unusual activity detected in INFY");
        assert_eq!(alerts[0].related_asset.as_deref(), Some("INFY"));
        assert!(alerts[0].metadata.is_some());
    }

    #[test]
    fn test_in_batch_dedup_keeps_first() {
        let first = Alert::new(AlertType::VolatilitySpike, AlertSeverity::High, "a", "first").with_asset("INFY");
        let mut second = first.clone();
        second.message = "second".into();
        let other = Alert::new(AlertType::VolatilitySpike, AlertSeverity::Low, "b", "other").with_asset("TCS");

        let batch = dedup_batch(vec![first, second, other], Duration::hours(24));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].message, "first");
        assert!(batch.iter().all(|a| !a.dedup_key.is_empty()));
    }
}
