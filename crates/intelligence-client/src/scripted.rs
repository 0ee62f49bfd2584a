//! Deterministic stand-in for the intelligence service.
//!
//! Every response is either configured up front or derived from the request with a
//! fixed formula, so runs are reproducible. Used by tests and by offline runs.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use finance_core::{AnalysisSnapshot, Holding, PortfolioMetrics, RiskProfile};
use std::sync::Mutex;

use crate::error::{IntelligenceError, IntelligenceResult};
use crate::models::*;
use crate::provider::IntelligenceProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Analyze,
    Advise,
    Simulate,
    DetectAnomalies,
}

pub struct ScriptedIntelligence {
    analysis: AnalysisResponse,
    advice: Option<AdviceResponse>,
    simulation: Option<SimulationResponse>,
    anomalies: Vec<Anomaly>,
    failing: DashSet<Endpoint>,
    calls: DashMap<Endpoint, usize>,
    last_simulation: Mutex<Option<SimulationRequest>>,
}

impl Default for ScriptedIntelligence {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedIntelligence {
    pub fn new() -> Self {
        Self {
            analysis: AnalysisResponse::default(),
            advice: None,
            simulation: None,
            anomalies: Vec::new(),
            failing: DashSet::new(),
            calls: DashMap::new(),
            last_simulation: Mutex::new(None),
        }
    }

    pub fn with_scores(mut self, risk_score: Option<f64>, liquidity_score: Option<f64>) -> Self {
        self.analysis.risk_score = risk_score;
        self.analysis.liquidity_score = liquidity_score;
        self
    }

    pub fn with_live_prices(mut self, prices: Vec<TickerPrice>) -> Self {
        self.analysis.holdings_with_real_time_prices = Some(prices);
        self
    }

    pub fn with_advice(mut self, advice: AdviceResponse) -> Self {
        self.advice = Some(advice);
        self
    }

    /// Fixed projection returned for every simulation
    pub fn with_simulation(mut self, simulation: SimulationResponse) -> Self {
        self.simulation = Some(simulation);
        self
    }

    pub fn with_anomalies(mut self, anomalies: Vec<Anomaly>) -> Self {
        self.anomalies = anomalies;
        self
    }

    /// Make `endpoint` fail as if the service were down
    pub fn failing(self, endpoint: Endpoint) -> Self {
        self.failing.insert(endpoint);
        self
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.get(&endpoint).map(|c| *c).unwrap_or(0)
    }

    pub fn last_simulation(&self) -> Option<SimulationRequest> {
        self.last_simulation.lock().ok().and_then(|guard| guard.clone())
    }

    fn record(&self, endpoint: Endpoint) -> IntelligenceResult<()> {
        *self.calls.entry(endpoint).or_insert(0) += 1;
        if self.failing.contains(&endpoint) {
            return Err(IntelligenceError::ServiceUnavailable(format!(
                "{:?} scripted to fail",
                endpoint
            )));
        }
        Ok(())
    }

    /// Linear projection from the scenario's `adjustment` (a fraction, e.g. -0.2).
    fn project(request: &SimulationRequest) -> SimulationResponse {
        let adjustment = request
            .parameters
            .get("adjustment")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let baseline = &request.current_state;
        let current_risk = baseline.risk_score.unwrap_or(50.0);

        let recommendations = if adjustment < 0.0 {
            vec![
                "Increase allocation to defensive assets such as bonds and gold".to_string(),
                "Keep an emergency reserve outside market-linked holdings".to_string(),
            ]
        } else if adjustment > 0.0 {
            vec!["Rebalance gains back to target allocation".to_string()]
        } else {
            Vec::new()
        };

        SimulationResponse {
            health_score: (baseline.health_score + adjustment * 40.0).clamp(0.0, 100.0).round(),
            risk_score: (current_risk - adjustment * 50.0).clamp(0.0, 100.0),
            projected_value: baseline.total_value * (1.0 + adjustment),
            recommendations,
        }
    }
}

#[async_trait]
impl IntelligenceProvider for ScriptedIntelligence {
    async fn analyze(
        &self,
        _holdings: &[Holding],
        _metrics: &PortfolioMetrics,
        _risk_profile: RiskProfile,
    ) -> IntelligenceResult<AnalysisResponse> {
        self.record(Endpoint::Analyze)?;
        Ok(self.analysis.clone())
    }

    async fn advise(
        &self,
        _context: &serde_json::Value,
        question: &str,
    ) -> IntelligenceResult<AdviceResponse> {
        self.record(Endpoint::Advise)?;
        Ok(self.advice.clone().unwrap_or_else(|| AdviceResponse {
            response: format!("Here is a general view on: {}", question.trim()),
            analysis: None,
            suggestions: Vec::new(),
            confidence: 0.8,
        }))
    }

    async fn simulate(&self, request: &SimulationRequest) -> IntelligenceResult<SimulationResponse> {
        self.record(Endpoint::Simulate)?;
        if let Ok(mut last) = self.last_simulation.lock() {
            *last = Some(request.clone());
        }
        Ok(self
            .simulation
            .clone()
            .unwrap_or_else(|| Self::project(request)))
    }

    async fn detect_anomalies(
        &self,
        _holdings: &[Holding],
        _history: &[AnalysisSnapshot],
    ) -> IntelligenceResult<Vec<Anomaly>> {
        self.record(Endpoint::DetectAnomalies)?;
        Ok(self.anomalies.clone())
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}
