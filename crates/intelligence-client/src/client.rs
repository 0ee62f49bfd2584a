use finance_core::{AnalysisSnapshot, Holding, PortfolioMetrics, RiskProfile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{IntelligenceError, IntelligenceResult};
use crate::models::*;
use crate::IntelligenceConfig;

/// HTTP client for the intelligence service
#[derive(Clone)]
pub struct IntelligenceClient {
    client: reqwest::Client,
    base_url: String,
}

impl IntelligenceClient {
    pub fn new(config: &IntelligenceConfig) -> IntelligenceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IntelligenceError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> IntelligenceResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(IntelligenceError::ServiceUnavailable(format!(
                "{} returned status {}",
                path,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| IntelligenceError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// Risk/liquidity scoring plus optional live prices
    pub async fn analyze(
        &self,
        holdings: &[Holding],
        metrics: &PortfolioMetrics,
        risk_profile: RiskProfile,
    ) -> IntelligenceResult<AnalysisResponse> {
        let request = AnalyzeRequest {
            portfolio: PortfolioPayload {
                holdings,
                metrics,
                user_risk_profile: risk_profile,
            },
        };
        self.post("analyze", &request).await
    }

    /// Natural-language advice for a question in the given context
    pub async fn advise(
        &self,
        context: &serde_json::Value,
        question: &str,
    ) -> IntelligenceResult<AdviceResponse> {
        self.post("advice", &AdviceRequest { context, question }).await
    }

    pub async fn simulate(&self, request: &SimulationRequest) -> IntelligenceResult<SimulationResponse> {
        self.post("simulate", &SimulateRequest { simulation: request }).await
    }

    pub async fn detect_anomalies(
        &self,
        holdings: &[Holding],
        history: &[AnalysisSnapshot],
    ) -> IntelligenceResult<Vec<Anomaly>> {
        let request = AnomalyRequest {
            current_portfolio: holdings,
            historical_data: history,
        };
        self.post("anomaly-detection", &request).await
    }

    /// Check service health
    pub async fn health(&self) -> IntelligenceResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}
