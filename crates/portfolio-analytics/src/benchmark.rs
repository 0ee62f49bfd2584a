//! Community benchmark ranking.
//!
//! Places one user's metric inside the anonymized community distribution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finance_core::{
    CommunityData, CommunityDataSource, FinanceError, FinanceResult, Holding, PortfolioMetrics,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::analysis::{PortfolioAnalysis, PortfolioAnalyzer};

pub const METRIC_HEALTH_SCORE: &str = "healthScore";
pub const METRIC_DIVERSIFICATION: &str = "diversification";
pub const METRIC_ANNUAL_RETURN: &str = "annualReturn";
pub const METRIC_RISK_SCORE: &str = "riskScore";

/// Metrics the engine can compute for a single user
pub const USER_METRICS: [&str; 4] = [
    METRIC_HEALTH_SCORE,
    METRIC_DIVERSIFICATION,
    METRIC_ANNUAL_RETURN,
    METRIC_RISK_SCORE,
];

/// Risk score assumed for a user when the intelligence service gives none
pub const FALLBACK_USER_RISK_SCORE: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpretation {
    #[serde(rename = "excellent")]
    Excellent,
    #[serde(rename = "very good")]
    VeryGood,
    #[serde(rename = "average")]
    Average,
    #[serde(rename = "below average")]
    BelowAverage,
    #[serde(rename = "needs improvement")]
    NeedsImprovement,
}

impl Interpretation {
    /// Step function of `user - average`; every band excludes its lower edge.
    pub fn from_difference(difference: f64) -> Self {
        if difference > 10.0 {
            Interpretation::Excellent
        } else if difference > 5.0 {
            Interpretation::VeryGood
        } else if difference > -5.0 {
            Interpretation::Average
        } else if difference > -10.0 {
            Interpretation::BelowAverage
        } else {
            Interpretation::NeedsImprovement
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Excellent => "excellent",
            Interpretation::VeryGood => "very good",
            Interpretation::Average => "average",
            Interpretation::BelowAverage => "below average",
            Interpretation::NeedsImprovement => "needs improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub metric: String,
    pub user_score: Option<f64>,
    pub community_average: Option<f64>,
    pub percentile: Option<u32>,
    pub benchmark: Option<f64>,
    pub interpretation: Option<Interpretation>,
}

/// Share of the distribution strictly below `value`, as a rounded percentage.
///
/// Equal values do not count as below. `None` for an empty distribution.
pub fn percentile_rank(value: f64, distribution: &[f64]) -> Option<u32> {
    if distribution.is_empty() {
        return None;
    }
    let below = distribution.iter().filter(|d| **d < value).count();
    Some((below as f64 / distribution.len() as f64 * 100.0).round() as u32)
}

/// Annualized return in percent.
///
/// Holding age is the value-weighted time since purchase. A year or more compounds
/// (CAGR); anything shorter reports the simple gain/loss.
pub fn annualized_return(holdings: &[Holding], metrics: &PortfolioMetrics, now: DateTime<Utc>) -> f64 {
    if metrics.total_cost <= 0.0 {
        return 0.0;
    }

    let weighted_value: f64 = holdings.iter().map(|h| h.current_value()).sum();
    let years = if weighted_value > 0.0 {
        holdings
            .iter()
            .map(|h| {
                let days = (now - h.purchase_date).num_days().max(0) as f64;
                h.current_value() * days / 365.25
            })
            .sum::<f64>()
            / weighted_value
    } else {
        0.0
    };

    if years < 1.0 {
        return metrics.total_gain_loss_percent;
    }
    if metrics.total_value <= 0.0 {
        return -100.0;
    }
    ((metrics.total_value / metrics.total_cost).powf(1.0 / years) - 1.0) * 100.0
}

/// The user's side of every benchmarkable metric
pub fn user_metrics(analysis: &PortfolioAnalysis, now: DateTime<Utc>) -> BTreeMap<String, f64> {
    let metrics = &analysis.basic_metrics;
    let mut values = BTreeMap::new();
    values.insert(METRIC_HEALTH_SCORE.to_string(), analysis.health_score as f64);
    values.insert(METRIC_DIVERSIFICATION.to_string(), metrics.diversification_score);
    values.insert(
        METRIC_ANNUAL_RETURN.to_string(),
        annualized_return(&analysis.portfolio.holdings, metrics, now),
    );
    values.insert(
        METRIC_RISK_SCORE.to_string(),
        analysis.risk_score.unwrap_or(FALLBACK_USER_RISK_SCORE),
    );
    values
}

/// Compare one metric. Fails with `InvalidMetric` only when neither side knows it.
pub fn rank(
    metric: &str,
    user_values: &BTreeMap<String, f64>,
    community: &CommunityData,
) -> FinanceResult<BenchmarkResult> {
    let user_score = user_values.get(metric).copied();
    if user_score.is_none() && !community.has_metric(metric) {
        return Err(FinanceError::InvalidMetric(metric.to_string()));
    }

    let community_average = community.averages.get(metric).copied();
    let percentile = match (user_score, community.distribution.get(metric)) {
        (Some(score), Some(distribution)) => percentile_rank(score, distribution),
        _ => None,
    };
    let interpretation = match (user_score, community_average) {
        (Some(score), Some(average)) => Some(Interpretation::from_difference(score - average)),
        _ => None,
    };

    Ok(BenchmarkResult {
        metric: metric.to_string(),
        user_score,
        community_average,
        percentile,
        benchmark: community.benchmarks.get(metric).copied(),
        interpretation,
    })
}

/// Fixed community aggregates
pub struct StaticCommunityData {
    data: CommunityData,
}

impl StaticCommunityData {
    pub fn new(data: CommunityData) -> Self {
        Self { data }
    }
}

impl Default for StaticCommunityData {
    fn default() -> Self {
        let averages = BTreeMap::from([
            (METRIC_HEALTH_SCORE.to_string(), 65.0),
            (METRIC_DIVERSIFICATION.to_string(), 60.0),
            (METRIC_ANNUAL_RETURN.to_string(), 12.5),
            (METRIC_RISK_SCORE.to_string(), 55.0),
        ]);
        let distribution = BTreeMap::from([
            (
                METRIC_HEALTH_SCORE.to_string(),
                vec![40.0, 50.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0],
            ),
            (
                METRIC_DIVERSIFICATION.to_string(),
                vec![30.0, 40.0, 50.0, 60.0, 65.0, 70.0, 75.0, 80.0],
            ),
            (
                METRIC_ANNUAL_RETURN.to_string(),
                vec![5.0, 8.0, 10.0, 12.0, 15.0, 18.0, 20.0, 25.0],
            ),
            (
                METRIC_RISK_SCORE.to_string(),
                vec![40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0],
            ),
        ]);
        let benchmarks = BTreeMap::from([
            (METRIC_HEALTH_SCORE.to_string(), 75.0),
            (METRIC_DIVERSIFICATION.to_string(), 70.0),
            (METRIC_ANNUAL_RETURN.to_string(), 15.0),
            (METRIC_RISK_SCORE.to_string(), 50.0),
        ]);

        Self::new(CommunityData {
            averages,
            distribution,
            benchmarks,
        })
    }
}

#[async_trait]
impl CommunityDataSource for StaticCommunityData {
    async fn aggregated(&self) -> FinanceResult<CommunityData> {
        Ok(self.data.clone())
    }
}

/// Benchmarks a user against the community
pub struct BenchmarkRanker {
    analyzer: PortfolioAnalyzer,
    community: Arc<dyn CommunityDataSource>,
}

impl BenchmarkRanker {
    pub fn new(analyzer: PortfolioAnalyzer, community: Arc<dyn CommunityDataSource>) -> Self {
        Self { analyzer, community }
    }

    pub async fn community_benchmark(&self, user_id: &str, metric: &str) -> FinanceResult<BenchmarkResult> {
        if self.analyzer.store().find_portfolio(user_id).await?.is_none() {
            return Err(FinanceError::NotFound(format!("portfolio for user {}", user_id)));
        }

        let community = self.community.aggregated().await?;
        if !USER_METRICS.contains(&metric) && !community.has_metric(metric) {
            return Err(FinanceError::InvalidMetric(metric.to_string()));
        }

        let analysis = self.analyzer.analyze(user_id).await?;
        let values = user_metrics(&analysis, Utc::now());
        let result = rank(metric, &values, &community)?;

        info!(
            "Benchmark {} for {}: score {:?}, percentile {:?}",
            metric, user_id, result.user_score, result.percentile
        );
        debug!("Community average for {}: {:?}", metric, result.community_average);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use finance_core::AssetType;

    #[test]
    fn test_percentile_strict_less_than() {
        assert_eq!(percentile_rank(70.0, &[70.0, 70.0, 70.0]), Some(0));
        assert_eq!(percentile_rank(71.0, &[70.0, 70.0, 70.0]), Some(100));
        assert_eq!(percentile_rank(65.0, &[40.0, 50.0, 60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0]), Some(33));
        assert_eq!(percentile_rank(10.0, &[]), None);
    }

    #[test]
    fn test_percentile_ignores_order() {
        let sorted = [5.0, 8.0, 10.0, 12.0, 15.0, 18.0, 20.0, 25.0];
        let shuffled = [20.0, 5.0, 25.0, 12.0, 8.0, 18.0, 10.0, 15.0];
        assert_eq!(percentile_rank(13.0, &sorted), percentile_rank(13.0, &shuffled));
        assert_eq!(percentile_rank(13.0, &sorted), Some(50));
    }

    #[test]
    fn test_interpretation_boundaries() {
        assert_eq!(Interpretation::from_difference(10.5), Interpretation::Excellent);
        assert_eq!(Interpretation::from_difference(10.0), Interpretation::VeryGood);
        assert_eq!(Interpretation::from_difference(5.0), Interpretation::Average);
        assert_eq!(Interpretation::from_difference(-4.9), Interpretation::Average);
        assert_eq!(Interpretation::from_difference(-5.0), Interpretation::BelowAverage);
        assert_eq!(Interpretation::from_difference(-10.0), Interpretation::NeedsImprovement);
        assert_eq!(
            serde_json::to_value(Interpretation::VeryGood).unwrap(),
            serde_json::json!("very good")
        );
    }

    #[test]
    fn test_rank_unknown_metric() {
        let community = StaticCommunityData::default().data;
        let err = rank("sharpeRatio", &BTreeMap::new(), &community).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidMetric(m) if m == "sharpeRatio"));
    }

    #[test]
    fn test_rank_known_metric() {
        let community = StaticCommunityData::default().data;
        let values = BTreeMap::from([(METRIC_HEALTH_SCORE.to_string(), 80.0)]);
        let result = rank(METRIC_HEALTH_SCORE, &values, &community).unwrap();
        assert_eq!(result.user_score, Some(80.0));
        assert_eq!(result.community_average, Some(65.0));
        assert_eq!(result.percentile, Some(67));
        assert_eq!(result.benchmark, Some(75.0));
        assert_eq!(result.interpretation, Some(Interpretation::Excellent));
    }

    #[test]
    fn test_rank_metric_only_community_knows() {
        let community = StaticCommunityData::default().data;
        let result = rank(METRIC_RISK_SCORE, &BTreeMap::new(), &community).unwrap();
        assert_eq!(result.user_score, None);
        assert_eq!(result.percentile, None);
        assert_eq!(result.interpretation, None);
        assert_eq!(result.community_average, Some(55.0));
    }

    #[test]
    fn test_annualized_return() {
        let now = Utc::now();
        let metrics = |value: f64, cost: f64| PortfolioMetrics {
            total_value: value,
            total_cost: cost,
            total_gain_loss: value - cost,
            total_gain_loss_percent: (value - cost) / cost * 100.0,
            ..Default::default()
        };

        let recent = vec![Holding::new(AssetType::Stock, "A", "A", 1.0, 100.0)
            .with_current_price(110.0)
            .with_purchase_date(now - Duration::days(30))];
        assert!((annualized_return(&recent, &metrics(110.0, 100.0), now) - 10.0).abs() < 1e-9);

        let two_years = vec![Holding::new(AssetType::Stock, "A", "A", 1.0, 100.0)
            .with_current_price(121.0)
            .with_purchase_date(now - Duration::days(731))];
        let cagr = annualized_return(&two_years, &metrics(121.0, 100.0), now);
        assert!((cagr - 10.0).abs() < 0.05, "cagr was {}", cagr);

        assert_eq!(annualized_return(&[], &PortfolioMetrics::default(), now), 0.0);
    }
}
