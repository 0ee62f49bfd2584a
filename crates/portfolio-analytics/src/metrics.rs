//! Allocation & metrics calculation.
//!
//! Pure functions over a holdings list. No I/O, no clock except where a timestamp is
//! passed in.

use chrono::{DateTime, Utc};
use finance_core::{AssetType, Holding, Portfolio, PortfolioMetrics};
use std::collections::BTreeMap;

/// Value, cost, gain/loss, allocations and diversification for `holdings`.
///
/// Total over any list, including an empty one (all zeros). When the total value is
/// zero the allocation buckets are kept at zero instead of being normalized.
pub fn calculate_metrics(holdings: &[Holding]) -> PortfolioMetrics {
    let mut total_value = 0.0;
    let mut total_cost = 0.0;
    let mut sector_allocation: BTreeMap<String, f64> = BTreeMap::new();
    let mut asset_allocation: BTreeMap<AssetType, f64> = BTreeMap::new();

    for holding in holdings {
        let current_value = holding.current_value();
        total_value += current_value;
        total_cost += holding.cost_value();

        *sector_allocation
            .entry(holding.sector_key().to_string())
            .or_insert(0.0) += current_value;
        *asset_allocation.entry(holding.asset_type).or_insert(0.0) += current_value;
    }

    let total_gain_loss = total_value - total_cost;
    let total_gain_loss_percent = if total_cost > 0.0 {
        total_gain_loss / total_cost * 100.0
    } else {
        0.0
    };

    if total_value > 0.0 {
        for value in sector_allocation.values_mut() {
            *value = *value / total_value * 100.0;
        }
        for value in asset_allocation.values_mut() {
            *value = *value / total_value * 100.0;
        }
    }

    let diversification_score = diversification_score(&sector_allocation);

    PortfolioMetrics {
        total_value,
        total_cost,
        total_gain_loss,
        total_gain_loss_percent,
        sector_allocation,
        asset_allocation,
        number_of_holdings: holdings.len(),
        diversification_score,
    }
}

/// Normalized Shannon entropy of the sector weights, 0–100.
///
/// `allocation` holds percentages. Only sectors with positive weight count, both in
/// the entropy and in the `ln(n)` normalizer. Fewer than two such sectors scores 0:
/// one sector is no diversification.
pub fn diversification_score(allocation: &BTreeMap<String, f64>) -> f64 {
    let weights: Vec<f64> = allocation
        .values()
        .map(|pct| pct / 100.0)
        .filter(|w| *w > 0.0)
        .collect();

    if weights.len() < 2 {
        return 0.0;
    }

    let entropy: f64 = weights.iter().map(|w| -w * w.ln()).sum();
    let max_entropy = (weights.len() as f64).ln();

    (entropy / max_entropy * 100.0).clamp(0.0, 100.0)
}

/// Copy of `portfolio` with its cached valuation fields recomputed from `metrics`.
///
/// The daily change is measured against the value at the start of the UTC day: the
/// previous total when the last update was on an earlier day, otherwise the previous
/// total minus the change already booked today. `net_flow` is the value added (or,
/// when negative, withdrawn) by holding changes; it moves the baseline so that only
/// price movement shows up as daily change. A zero baseline (new portfolio) books no
/// change.
pub fn refresh_valuation(
    portfolio: &Portfolio,
    metrics: &PortfolioMetrics,
    net_flow: f64,
    now: DateTime<Utc>,
) -> Portfolio {
    let same_day = portfolio.last_updated.date_naive() == now.date_naive();
    let start_of_day = if same_day {
        portfolio.total_value - portfolio.daily_change
    } else {
        portfolio.total_value
    };
    let baseline = start_of_day + net_flow;

    let mut next = portfolio.clone();
    next.total_value = metrics.total_value;
    if baseline > 0.0 {
        next.daily_change = metrics.total_value - baseline;
        next.daily_change_percent = next.daily_change / baseline * 100.0;
    } else {
        next.daily_change = 0.0;
        next.daily_change_percent = 0.0;
    }
    next.last_updated = now;
    next
}

/// Current value of a set of holdings
pub fn holdings_value(holdings: &[Holding]) -> f64 {
    holdings.iter().map(Holding::current_value).sum()
}
