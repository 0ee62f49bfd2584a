use chrono::{DateTime, Utc};
use finance_core::{
    AnalysisSnapshot, FinanceError, FinanceResult, Holding, HoldingUpdate, MarketDataProvider,
    Portfolio, PortfolioMetrics, PortfolioStore,
};
use intelligence_client::{AnalysisResponse, IntelligenceProvider, SimulationBaseline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::health::{health_score, HealthBand};
use crate::holdings;
use crate::metrics::{calculate_metrics, holdings_value, refresh_valuation};
use crate::pricing::{apply_prices, price_map};

/// Full analysis of one portfolio at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAnalysis {
    pub portfolio: Portfolio,
    pub basic_metrics: PortfolioMetrics,
    pub intelligence: AnalysisResponse,
    pub health_score: u8,
    pub health_band: HealthBand,
    pub risk_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PortfolioAnalysis {
    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            user_id: self.portfolio.user_id.clone(),
            health_score: self.health_score as f64,
            total_value: self.basic_metrics.total_value,
            diversification_score: self.basic_metrics.diversification_score,
            risk_score: self.risk_score,
            taken_at: self.timestamp,
        }
    }

    /// Current state handed to the simulator
    pub fn baseline(&self) -> SimulationBaseline {
        let metrics = &self.basic_metrics;
        SimulationBaseline {
            total_value: metrics.total_value,
            total_cost: metrics.total_cost,
            health_score: self.health_score as f64,
            risk_score: self.risk_score,
            diversification_score: metrics.diversification_score,
            total_gain_loss_percent: metrics.total_gain_loss_percent,
            sector_allocation: metrics.sector_allocation.clone(),
            asset_allocation: metrics.asset_allocation.clone(),
        }
    }
}

/// Loads portfolios, consults the intelligence service and keeps the cached
/// valuation fields current.
#[derive(Clone)]
pub struct PortfolioAnalyzer {
    store: Arc<dyn PortfolioStore>,
    intelligence: Arc<dyn IntelligenceProvider>,
    market: Arc<dyn MarketDataProvider>,
}

impl PortfolioAnalyzer {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        intelligence: Arc<dyn IntelligenceProvider>,
        market: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self {
            store,
            intelligence,
            market,
        }
    }

    pub fn store(&self) -> &Arc<dyn PortfolioStore> {
        &self.store
    }

    pub fn intelligence(&self) -> &Arc<dyn IntelligenceProvider> {
        &self.intelligence
    }

    pub fn market(&self) -> &Arc<dyn MarketDataProvider> {
        &self.market
    }

    async fn load_portfolio(&self, user_id: &str) -> FinanceResult<Portfolio> {
        self.store
            .find_portfolio(user_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("portfolio for user {}", user_id)))
    }

    /// Recompute metrics and caches for `portfolio` and persist it with a version check.
    ///
    /// `net_flow` is the value the caller added or removed by editing holdings, as
    /// opposed to price movement.
    async fn persist(
        &self,
        portfolio: &Portfolio,
        net_flow: f64,
    ) -> FinanceResult<(Portfolio, PortfolioMetrics)> {
        let metrics = calculate_metrics(&portfolio.holdings);
        let refreshed = refresh_valuation(portfolio, &metrics, net_flow, Utc::now());
        let saved = self.store.save_portfolio(&refreshed).await?;
        debug!(
            "Saved portfolio for {} at version {} (value {:.2})",
            saved.user_id, saved.version, saved.total_value
        );
        Ok((saved, metrics))
    }

    /// Analyze a user's portfolio.
    ///
    /// Live prices reported by the intelligence service are applied and saved before
    /// the health score is computed, so the score reflects the repriced holdings.
    pub async fn analyze(&self, user_id: &str) -> FinanceResult<PortfolioAnalysis> {
        let mut portfolio = self.load_portfolio(user_id).await?;
        if portfolio.holdings.is_empty() {
            return Err(FinanceError::NotFound(format!("portfolio for user {} is empty", user_id)));
        }
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("user {}", user_id)))?;

        let mut metrics = calculate_metrics(&portfolio.holdings);
        let intelligence = self
            .intelligence
            .analyze(&portfolio.holdings, &metrics, user.preferences.risk_profile)
            .await?;

        if let Some(live) = &intelligence.holdings_with_real_time_prices {
            let (repriced, changed) = apply_prices(&portfolio.holdings, &price_map(live));
            if changed > 0 {
                portfolio.holdings = repriced;
                let (saved, refreshed) = self.persist(&portfolio, 0.0).await?;
                portfolio = saved;
                metrics = refreshed;
                debug!("Applied {} live prices for {}", changed, user_id);
            }
        }

        let score = health_score(&metrics, intelligence.risk_score, intelligence.liquidity_score);
        info!(
            "Analyzed portfolio for {}: {} holdings, value {:.2}, health {}",
            user_id, metrics.number_of_holdings, metrics.total_value, score
        );

        Ok(PortfolioAnalysis {
            portfolio,
            risk_score: intelligence.risk_score.filter(|s| s.is_finite()),
            basic_metrics: metrics,
            intelligence,
            health_score: score,
            health_band: HealthBand::from_score(score as f64),
            timestamp: Utc::now(),
        })
    }

    /// Recompute the cached valuation fields from the current holdings.
    pub async fn update_portfolio_value(&self, user_id: &str) -> FinanceResult<(Portfolio, PortfolioMetrics)> {
        let portfolio = self.load_portfolio(user_id).await?;
        self.persist(&portfolio, 0.0).await
    }

    /// Reprice holdings from the market-data feed and save.
    pub async fn refresh_prices(&self, user_id: &str) -> FinanceResult<(Portfolio, PortfolioMetrics)> {
        let mut portfolio = self.load_portfolio(user_id).await?;
        let quotes = self.market.current_prices(&portfolio.tickers()).await?;
        let (repriced, changed) = apply_prices(&portfolio.holdings, &quotes);
        portfolio.holdings = repriced;
        info!("Refreshed {} prices for {}", changed, user_id);
        self.persist(&portfolio, 0.0).await
    }

    /// Add one or more holdings, creating the portfolio on first use.
    pub async fn add_holdings(&self, user_id: &str, new_holdings: Vec<Holding>) -> FinanceResult<Portfolio> {
        let current = self
            .store
            .find_portfolio(user_id)
            .await?
            .unwrap_or_else(|| Portfolio::new(user_id));
        let count = new_holdings.len();
        let next = holdings::add_holdings(&current, new_holdings)?;
        let flow = holdings_value(&next.holdings) - holdings_value(&current.holdings);
        let (saved, _) = self.persist(&next, flow).await?;
        info!("Added {} holdings for {}", count, user_id);
        Ok(saved)
    }

    pub async fn update_holding(
        &self,
        user_id: &str,
        holding_id: &str,
        update: &HoldingUpdate,
    ) -> FinanceResult<Portfolio> {
        let current = self.load_portfolio(user_id).await?;
        let next = holdings::update_holding(&current, holding_id, update)?;
        let flow = holdings_value(&next.holdings) - holdings_value(&current.holdings);
        let (saved, _) = self.persist(&next, flow).await?;
        info!("Updated holding {} for {}", holding_id, user_id);
        Ok(saved)
    }

    pub async fn delete_holding(&self, user_id: &str, holding_id: &str) -> FinanceResult<Portfolio> {
        let current = self.load_portfolio(user_id).await?;
        let next = holdings::remove_holding(&current, holding_id)?;
        let flow = holdings_value(&next.holdings) - holdings_value(&current.holdings);
        let (saved, _) = self.persist(&next, flow).await?;
        info!("Removed holding {} for {}", holding_id, user_id);
        Ok(saved)
    }
}
