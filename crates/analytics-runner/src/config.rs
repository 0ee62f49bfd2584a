use anyhow::{Context, Result};
use intelligence_client::IntelligenceConfig;
use portfolio_analytics::EngineConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub database_url: String,
    /// `None` when `INTELLIGENCE_OFFLINE=true`: the deterministic double is used instead
    pub intelligence: Option<IntelligenceConfig>,
    pub engine: EngineConfig,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        let offline: bool = env::var("INTELLIGENCE_OFFLINE")
            .unwrap_or_else(|_| "false".to_string())
            .trim()
            .parse()
            .context("INTELLIGENCE_OFFLINE must be true or false")?;

        let intelligence = if offline {
            None
        } else {
            Some(
                IntelligenceConfig::from_env()
                    .context("INTELLIGENCE_API_URL must be set unless INTELLIGENCE_OFFLINE=true")?,
            )
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:wealth.db".to_string()),
            intelligence,
            engine: EngineConfig::from_env().context("invalid engine configuration")?,
        })
    }
}
