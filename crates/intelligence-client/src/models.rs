use finance_core::{AnalysisSnapshot, AssetType, Holding, PortfolioMetrics, RiskProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A live price reported back by the analyze endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerPrice {
    pub ticker: String,
    pub current_price: f64,
}

/// Response of `POST /analyze`. Unknown fields are preserved in `extra` so callers
/// can pass the full analysis through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub liquidity_score: Option<f64>,
    #[serde(default, rename = "holdings_with_real_time_prices")]
    pub holdings_with_real_time_prices: Option<Vec<TickerPrice>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of `POST /advice`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub response: String,
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

/// Current state handed to the simulator alongside the scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationBaseline {
    pub total_value: f64,
    pub total_cost: f64,
    pub health_score: f64,
    #[serde(default)]
    pub risk_score: Option<f64>,
    pub diversification_score: f64,
    pub total_gain_loss_percent: f64,
    pub sector_allocation: BTreeMap<String, f64>,
    pub asset_allocation: BTreeMap<AssetType, f64>,
}

/// The `simulationData` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub user_id: String,
    pub simulation_type: String,
    pub parameters: serde_json::Value,
    pub current_state: SimulationBaseline,
}

/// Projected state returned by `POST /simulate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub health_score: f64,
    pub risk_score: f64,
    pub projected_value: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One entry of the `POST /anomaly-detection` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub asset: String,
    pub confidence: f64,
    pub description: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PortfolioPayload<'a> {
    pub holdings: &'a [Holding],
    pub metrics: &'a PortfolioMetrics,
    pub user_risk_profile: RiskProfile,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeRequest<'a> {
    pub portfolio: PortfolioPayload<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdviceRequest<'a> {
    pub context: &'a serde_json::Value,
    pub question: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SimulateRequest<'a> {
    pub simulation: &'a SimulationRequest,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnomalyRequest<'a> {
    pub current_portfolio: &'a [Holding],
    pub historical_data: &'a [AnalysisSnapshot],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_response_keeps_unknown_fields() {
        let json = r#"{
            "riskScore": 62.5,
            "holdings_with_real_time_prices": [{"ticker": "INFY", "currentPrice": 1612.4}],
            "summary": "Tilted towards IT services"
        }"#;
        let parsed: AnalysisResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.risk_score, Some(62.5));
        assert_eq!(parsed.liquidity_score, None);
        assert_eq!(parsed.holdings_with_real_time_prices.unwrap()[0].current_price, 1612.4);
        assert_eq!(parsed.extra["summary"], "Tilted towards IT services");
    }

    #[test]
    fn test_simulation_response_defaults_recommendations() {
        let json = r#"{"healthScore": 68, "riskScore": 71.0, "projectedValue": 80000}"#;
        let parsed: SimulationResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.health_score, 68.0);
        assert!(parsed.recommendations.is_empty());
    }
}
