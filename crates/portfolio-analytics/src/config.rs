use chrono::Duration;
use finance_core::{FinanceError, FinanceResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Tunables of the analytics engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub alert_dedup_window_hours: i64,     // 24
    pub max_sector_concentration: f64,     // 40 (%)
    pub goal_pace_tolerance: f64,          // 0.10
    pub default_alert_threshold: f64,      // 5 (%)
    pub snapshot_history_limit: usize,     // 30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alert_dedup_window_hours: 24,
            max_sector_concentration: 40.0,
            goal_pace_tolerance: 0.10,
            default_alert_threshold: 5.0,
            snapshot_history_limit: 30,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> FinanceResult<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| FinanceError::InvalidInput(format!("{} is not a valid number: {}", key, raw))),
        _ => Ok(default),
    }
}

impl EngineConfig {
    pub fn from_env() -> FinanceResult<Self> {
        let defaults = Self::default();
        let config = Self {
            alert_dedup_window_hours: env_or("ALERT_DEDUP_WINDOW_HOURS", defaults.alert_dedup_window_hours)?,
            max_sector_concentration: env_or("MAX_SECTOR_CONCENTRATION", defaults.max_sector_concentration)?,
            goal_pace_tolerance: env_or("GOAL_PACE_TOLERANCE", defaults.goal_pace_tolerance)?,
            default_alert_threshold: env_or("DEFAULT_ALERT_THRESHOLD", defaults.default_alert_threshold)?,
            snapshot_history_limit: defaults.snapshot_history_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FinanceResult<()> {
        let hours = self.alert_dedup_window_hours;
        if hours <= 0 || Duration::try_hours(hours).is_none() {
            return Err(FinanceError::InvalidInput(format!(
                "ALERT_DEDUP_WINDOW_HOURS out of range: {}",
                hours
            )));
        }
        if !(0.0..=100.0).contains(&self.max_sector_concentration) {
            return Err(FinanceError::InvalidInput(
                "MAX_SECTOR_CONCENTRATION must be a percentage".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.goal_pace_tolerance) {
            return Err(FinanceError::InvalidInput(
                "GOAL_PACE_TOLERANCE must be in [0, 1)".into(),
            ));
        }
        if !self.default_alert_threshold.is_finite() || self.default_alert_threshold <= 0.0 {
            return Err(FinanceError::InvalidInput(
                "DEFAULT_ALERT_THRESHOLD must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Falls back to one day when the configured window is not representable.
    pub fn dedup_window(&self) -> Duration {
        Duration::try_hours(self.alert_dedup_window_hours)
            .filter(|w| *w > Duration::zero())
            .unwrap_or_else(|| Duration::hours(24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dedup_window(), Duration::hours(24));
    }

    #[test]
    fn test_huge_dedup_window_rejected() {
        let config = EngineConfig {
            alert_dedup_window_hours: 10_000_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FinanceError::InvalidInput(_))));
        assert_eq!(config.dedup_window(), Duration::hours(24));
    }

    #[test]
    fn test_out_of_range_tolerance_rejected() {
        let config = EngineConfig {
            goal_pace_tolerance: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FinanceError::InvalidInput(_))));
    }
}
