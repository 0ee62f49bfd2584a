use async_trait::async_trait;
use finance_core::{AnalysisSnapshot, Holding, PortfolioMetrics, RiskProfile};

use crate::client::IntelligenceClient;
use crate::error::IntelligenceResult;
use crate::models::*;

/// Backend-agnostic interface to the intelligence collaborator.
///
/// Implemented by the HTTP client and by the deterministic [`crate::ScriptedIntelligence`].
#[async_trait]
pub trait IntelligenceProvider: Send + Sync {
    async fn analyze(
        &self,
        holdings: &[Holding],
        metrics: &PortfolioMetrics,
        risk_profile: RiskProfile,
    ) -> IntelligenceResult<AnalysisResponse>;

    async fn advise(
        &self,
        context: &serde_json::Value,
        question: &str,
    ) -> IntelligenceResult<AdviceResponse>;

    async fn simulate(&self, request: &SimulationRequest) -> IntelligenceResult<SimulationResponse>;

    async fn detect_anomalies(
        &self,
        holdings: &[Holding],
        history: &[AnalysisSnapshot],
    ) -> IntelligenceResult<Vec<Anomaly>>;

    fn backend_name(&self) -> &'static str;
}

/// HTTP-backed implementation that delegates to [`IntelligenceClient`].
pub struct HttpIntelligence {
    client: IntelligenceClient,
}

impl HttpIntelligence {
    pub fn new(client: IntelligenceClient) -> Self {
        Self { client }
    }

    /// True when the service answers its health endpoint with a success status
    pub async fn health(&self) -> IntelligenceResult<bool> {
        self.client.health().await
    }
}

impl From<IntelligenceClient> for HttpIntelligence {
    fn from(client: IntelligenceClient) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl IntelligenceProvider for HttpIntelligence {
    async fn analyze(
        &self,
        holdings: &[Holding],
        metrics: &PortfolioMetrics,
        risk_profile: RiskProfile,
    ) -> IntelligenceResult<AnalysisResponse> {
        self.client.analyze(holdings, metrics, risk_profile).await
    }

    async fn advise(
        &self,
        context: &serde_json::Value,
        question: &str,
    ) -> IntelligenceResult<AdviceResponse> {
        self.client.advise(context, question).await
    }

    async fn simulate(&self, request: &SimulationRequest) -> IntelligenceResult<SimulationResponse> {
        self.client.simulate(request).await
    }

    async fn detect_anomalies(
        &self,
        holdings: &[Holding],
        history: &[AnalysisSnapshot],
    ) -> IntelligenceResult<Vec<Anomaly>> {
        self.client.detect_anomalies(holdings, history).await
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
