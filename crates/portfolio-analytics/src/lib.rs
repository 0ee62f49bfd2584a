pub mod advisor;
pub mod alerts;
pub mod analysis;
pub mod benchmark;
pub mod config;
pub mod engine;
pub mod goals;
pub mod health;
pub mod holdings;
pub mod metrics;
pub mod pricing;
pub mod simulation;


pub use advisor::{AdvisorReply, AdvisorService, ConversationSummary};
pub use alerts::{AlertGenerator, AlertInbox};
pub use analysis::{PortfolioAnalysis, PortfolioAnalyzer};
pub use benchmark::{BenchmarkRanker, BenchmarkResult, Interpretation, StaticCommunityData};
pub use config::EngineConfig;
pub use engine::FinanceEngine;
pub use health::{health_score, HealthBand};
pub use metrics::{calculate_metrics, diversification_score};
pub use pricing::StaticMarketData;
pub use simulation::{CustomSimulation, ImpactAnalysis, Scenario, SimulationEngine, SimulationResult};
