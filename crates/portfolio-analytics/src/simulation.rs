//! What-if simulation.
//!
//! A scenario (named preset or caller-supplied parameters) is sent to the intelligence
//! service together with the current state, and the projection is compared against
//! that state.

use finance_core::{FinanceError, FinanceResult};
use intelligence_client::{IntelligenceProvider, SimulationBaseline, SimulationRequest, SimulationResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analysis::PortfolioAnalyzer;

/// Action sent for every preset scenario
pub const STRESS_TEST_ACTION: &str = "stress_test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    /// Fractional market move, e.g. -0.2 for a 20% fall
    pub adjustment: f64,
}

const PRESETS: [(&str, &str, f64); 4] = [
    ("market_crash", "Market downturn (-20%)", -0.20),
    ("market_boom", "Market growth (+20%)", 0.20),
    ("high_inflation", "High inflation scenario", -0.10),
    ("sector_specific", "Sector-specific event", -0.15),
];

pub fn preset(name: &str) -> Option<Scenario> {
    PRESETS
        .iter()
        .find(|(preset, _, _)| *preset == name)
        .map(|(name, description, adjustment)| Scenario {
            name: name.to_string(),
            description: description.to_string(),
            adjustment: *adjustment,
        })
}

pub fn presets() -> Vec<Scenario> {
    PRESETS.iter().filter_map(|(name, _, _)| preset(name)).collect()
}

/// Caller-defined simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSimulation {
    pub action: String,
    pub parameters: serde_json::Value,
}

impl CustomSimulation {
    pub fn validate(&self) -> FinanceResult<()> {
        if self.action.trim().is_empty() {
            return Err(FinanceError::InvalidInput("simulation action is required".into()));
        }
        if !self.parameters.is_object() {
            return Err(FinanceError::InvalidInput(
                "simulation parameters must be an object".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub health_score_change: f64,
    pub value_change: f64,
    pub risk_change: f64,
    /// Always 0: projections carry no allocation
    pub diversification_change: f64,
}

pub fn calculate_impact(current: &SimulationBaseline, simulated: &SimulationResponse) -> ImpactAnalysis {
    ImpactAnalysis {
        health_score_change: simulated.health_score - current.health_score,
        value_change: simulated.projected_value - current.total_value,
        risk_change: simulated.risk_score - current.risk_score.unwrap_or(0.0),
        diversification_change: 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub simulation_type: String,
    pub scenario: Option<Scenario>,
    pub current_state: SimulationBaseline,
    pub simulated_state: SimulationResponse,
    pub impact_analysis: ImpactAnalysis,
    pub recommendations: Vec<String>,
}

pub struct SimulationEngine {
    analyzer: PortfolioAnalyzer,
    intelligence: Arc<dyn IntelligenceProvider>,
}

impl SimulationEngine {
    pub fn new(analyzer: PortfolioAnalyzer) -> Self {
        let intelligence = analyzer.intelligence().clone();
        Self {
            analyzer,
            intelligence,
        }
    }

    /// Preset scenarios accepted by `run_what_if`
    pub fn scenarios(&self) -> Vec<Scenario> {
        presets()
    }

    /// Run a named preset. Unknown names fail before anything is loaded or sent.
    pub async fn run_what_if(&self, user_id: &str, scenario: &str) -> FinanceResult<SimulationResult> {
        let scenario = preset(scenario).ok_or_else(|| FinanceError::UnknownScenario(scenario.to_string()))?;
        let parameters = json!({
            "scenario": scenario.name,
            "description": scenario.description,
            "adjustment": scenario.adjustment,
        });
        self.simulate(user_id, STRESS_TEST_ACTION, parameters, Some(scenario))
            .await
    }

    pub async fn run_simulation(&self, user_id: &str, custom: CustomSimulation) -> FinanceResult<SimulationResult> {
        custom.validate()?;
        self.simulate(user_id, custom.action.trim(), custom.parameters, None)
            .await
    }

    async fn simulate(
        &self,
        user_id: &str,
        action: &str,
        parameters: serde_json::Value,
        scenario: Option<Scenario>,
    ) -> FinanceResult<SimulationResult> {
        let analysis = self.analyzer.analyze(user_id).await?;
        let current_state = analysis.baseline();

        let request = SimulationRequest {
            user_id: user_id.to_string(),
            simulation_type: action.to_string(),
            parameters,
            current_state: current_state.clone(),
        };
        let simulated = self.intelligence.simulate(&request).await?;

        let projected = [simulated.health_score, simulated.risk_score, simulated.projected_value];
        if projected.iter().any(|v| !v.is_finite()) {
            warn!("Simulation for {} returned non-finite values", user_id);
            return Err(FinanceError::CollaboratorUnavailable(
                "simulation returned non-finite values".into(),
            ));
        }

        let impact = calculate_impact(&current_state, &simulated);
        info!(
            "Simulation {} for {}: health {:+.0}, value {:+.2}",
            action, user_id, impact.health_score_change, impact.value_change
        );

        Ok(SimulationResult {
            simulation_type: action.to_string(),
            scenario,
            recommendations: simulated.recommendations.clone(),
            current_state,
            simulated_state: simulated,
            impact_analysis: impact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let crash = preset("market_crash").unwrap();
        assert_eq!(crash.adjustment, -0.20);
        assert_eq!(crash.description, "Market downturn (-20%)");
        assert_eq!(preset("sector_specific").unwrap().adjustment, -0.15);
        assert!(preset("hyperinflation_apocalypse").is_none());
        assert_eq!(presets().len(), 4);
    }

    #[test]
    fn test_impact() {
        let current = SimulationBaseline {
            total_value: 100_000.0,
            health_score: 75.0,
            risk_score: Some(60.0),
            ..Default::default()
        };
        let simulated = SimulationResponse {
            health_score: 68.0,
            risk_score: 72.0,
            projected_value: 80_000.0,
            recommendations: Vec::new(),
        };
        let impact = calculate_impact(&current, &simulated);
        assert_eq!(impact.health_score_change, -7.0);
        assert_eq!(impact.value_change, -20_000.0);
        assert_eq!(impact.risk_change, 12.0);
        assert_eq!(impact.diversification_change, 0.0);
    }

    #[test]
    fn test_missing_current_risk_counts_as_zero() {
        let current = SimulationBaseline::default();
        let simulated = SimulationResponse {
            risk_score: 40.0,
            ..Default::default()
        };
        assert_eq!(calculate_impact(&current, &simulated).risk_change, 40.0);
    }

    #[test]
    fn test_custom_simulation_validation() {
        let blank = CustomSimulation {
            action: " ".into(),
            parameters: json!({}),
        };
        assert!(matches!(blank.validate(), Err(FinanceError::InvalidInput(_))));

        let scalar = CustomSimulation {
            action: "rebalance".into(),
            parameters: json!(3),
        };
        assert!(scalar.validate().is_err());
    }
}
