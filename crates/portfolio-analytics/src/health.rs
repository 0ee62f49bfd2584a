use finance_core::PortfolioMetrics;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RISK_SCORE: f64 = 70.0;
pub const DEFAULT_LIQUIDITY_SCORE: f64 = 80.0;

/// Component weights of the health score
#[derive(Debug, Clone, Copy)]
pub struct HealthWeights {
    pub diversification: f64,
    pub performance: f64,
    pub risk: f64,
    pub liquidity: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self {
            diversification: 0.30,
            performance: 0.25,
            risk: 0.25,
            liquidity: 0.20,
        }
    }
}

/// Performance component: break-even maps to 50, ±25% gain/loss to 100/0.
pub fn performance_score(total_gain_loss_percent: f64) -> f64 {
    (50.0 + total_gain_loss_percent * 2.0).clamp(0.0, 100.0)
}

/// Composite 0–100 financial health score.
///
/// Missing (or non-finite) external scores fall back to the defaults.
pub fn health_score(metrics: &PortfolioMetrics, risk_score: Option<f64>, liquidity_score: Option<f64>) -> u8 {
    let weights = HealthWeights::default();
    let risk = risk_score.filter(|s| s.is_finite()).unwrap_or(DEFAULT_RISK_SCORE);
    let liquidity = liquidity_score
        .filter(|s| s.is_finite())
        .unwrap_or(DEFAULT_LIQUIDITY_SCORE);
    let performance = if metrics.total_gain_loss_percent.is_nan() {
        performance_score(0.0)
    } else {
        performance_score(metrics.total_gain_loss_percent)
    };

    let score = metrics.diversification_score * weights.diversification
        + performance * weights.performance
        + risk * weights.risk
        + liquidity * weights.liquidity;

    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

/// Qualitative label for a health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthBand {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 85.0 => HealthBand::Excellent,
            s if s >= 70.0 => HealthBand::Good,
            s if s >= 55.0 => HealthBand::Fair,
            s if s >= 40.0 => HealthBand::Poor,
            _ => HealthBand::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(diversification: f64, gain_pct: f64) -> PortfolioMetrics {
        PortfolioMetrics {
            diversification_score: diversification,
            total_gain_loss_percent: gain_pct,
            ..Default::default()
        }
    }

    #[test]
    fn test_weighted_composite() {
        // 60*0.3 + 70*0.25 + 50*0.25 + 90*0.2 = 18 + 17.5 + 12.5 + 18
        assert_eq!(health_score(&metrics(60.0, 10.0), Some(50.0), Some(90.0)), 66);
    }

    #[test]
    fn test_missing_external_scores_use_defaults() {
        // 0 + 50*0.25 + 70*0.25 + 80*0.2 = 12.5 + 17.5 + 16
        assert_eq!(health_score(&metrics(0.0, 0.0), None, None), 46);
        assert_eq!(
            health_score(&metrics(0.0, 0.0), Some(f64::NAN), None),
            health_score(&metrics(0.0, 0.0), None, None)
        );
    }

    #[test]
    fn test_zero_risk_score_is_not_a_default() {
        let with_zero = health_score(&metrics(0.0, 0.0), Some(0.0), None);
        assert!(with_zero < health_score(&metrics(0.0, 0.0), None, None));
    }

    #[test]
    fn test_score_clamped_for_pathological_inputs() {
        let crushed = health_score(&metrics(0.0, -250.0), Some(-500.0), Some(-500.0));
        assert_eq!(crushed, 0);
        let inflated = health_score(&metrics(100.0, 900.0), Some(1e6), Some(1e6));
        assert_eq!(inflated, 100);
        let total_loss = health_score(&metrics(40.0, -100.0), None, None);
        assert!(total_loss <= 100);
    }

    #[test]
    fn test_performance_band() {
        assert_eq!(performance_score(0.0), 50.0);
        assert_eq!(performance_score(25.0), 100.0);
        assert_eq!(performance_score(-25.0), 0.0);
        assert_eq!(performance_score(-80.0), 0.0);
    }

    #[test]
    fn test_health_band_cut_points() {
        assert_eq!(HealthBand::from_score(85.0), HealthBand::Excellent);
        assert_eq!(HealthBand::from_score(84.0), HealthBand::Good);
        assert_eq!(HealthBand::from_score(55.0), HealthBand::Fair);
        assert_eq!(HealthBand::from_score(40.0), HealthBand::Poor);
        assert_eq!(HealthBand::from_score(39.0), HealthBand::Critical);
    }
}
