use finance_core::{CommunityDataSource, MarketDataProvider, PortfolioStore};
use intelligence_client::IntelligenceProvider;
use std::sync::Arc;
use tracing::info;

use crate::advisor::AdvisorService;
use crate::alerts::AlertGenerator;
use crate::analysis::PortfolioAnalyzer;
use crate::benchmark::BenchmarkRanker;
use crate::config::EngineConfig;
use crate::simulation::SimulationEngine;

/// Every engine service wired to one set of collaborators
pub struct FinanceEngine {
    pub analyzer: PortfolioAnalyzer,
    pub benchmark: BenchmarkRanker,
    pub simulation: SimulationEngine,
    pub alerts: AlertGenerator,
    pub advisor: AdvisorService,
}

impl FinanceEngine {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        intelligence: Arc<dyn IntelligenceProvider>,
        market: Arc<dyn MarketDataProvider>,
        community: Arc<dyn CommunityDataSource>,
        config: EngineConfig,
    ) -> Self {
        info!("Finance engine using {} intelligence backend", intelligence.backend_name());
        let analyzer = PortfolioAnalyzer::new(store, intelligence, market);
        Self {
            benchmark: BenchmarkRanker::new(analyzer.clone(), community),
            simulation: SimulationEngine::new(analyzer.clone()),
            alerts: AlertGenerator::new(analyzer.clone(), config),
            advisor: AdvisorService::new(analyzer.clone()),
            analyzer,
        }
    }
}
