use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{FinanceError, FinanceResult};

/// Instrument class of a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Stock,
    MutualFund,
    Etf,
    Crypto,
    Bond,
    Fd,
    RealEstate,
    Gold,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stock => "stock",
            AssetType::MutualFund => "mutual_fund",
            AssetType::Etf => "etf",
            AssetType::Crypto => "crypto",
            AssetType::Bond => "bond",
            AssetType::Fd => "fd",
            AssetType::RealEstate => "real_estate",
            AssetType::Gold => "gold",
            AssetType::Other => "other",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

/// A single position held by a user.
///
/// `current_price` of 0 means the holding has not been priced yet; valuation then
/// falls back to `avg_buy_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    #[serde(default = "new_id")]
    pub id: String,
    pub asset_type: AssetType,
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub exchange: Option<String>,
    pub quantity: f64,
    pub avg_buy_price: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default = "Utc::now")]
    pub purchase_date: DateTime<Utc>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Holding {
    pub fn new(
        asset_type: AssetType,
        name: impl Into<String>,
        ticker: impl Into<String>,
        quantity: f64,
        avg_buy_price: f64,
    ) -> Self {
        Self {
            id: new_id(),
            asset_type,
            name: name.into(),
            ticker: ticker.into(),
            exchange: None,
            quantity,
            avg_buy_price,
            current_price: 0.0,
            sector: None,
            purchase_date: Utc::now(),
            currency: default_currency(),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = price;
        self
    }

    pub fn with_purchase_date(mut self, date: DateTime<Utc>) -> Self {
        self.purchase_date = date;
        self
    }

    /// Price used for valuation: the live price when known, else the buy price.
    pub fn effective_price(&self) -> f64 {
        if self.current_price > 0.0 {
            self.current_price
        } else {
            self.avg_buy_price
        }
    }

    pub fn current_value(&self) -> f64 {
        self.quantity * self.effective_price()
    }

    pub fn cost_value(&self) -> f64 {
        self.quantity * self.avg_buy_price
    }

    /// Sector bucket used for allocation ("other" when unset or blank).
    pub fn sector_key(&self) -> &str {
        match self.sector.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => "other",
        }
    }

    pub fn validate(&self) -> FinanceResult<()> {
        if self.name.trim().is_empty() {
            return Err(FinanceError::InvalidInput("holding name is required".into()));
        }
        if self.ticker.trim().is_empty() {
            return Err(FinanceError::InvalidInput("holding ticker is required".into()));
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("avgBuyPrice", self.avg_buy_price),
            ("currentPrice", self.current_price),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FinanceError::InvalidInput(format!(
                    "{} must be a non-negative number for {}",
                    field, self.ticker
                )));
            }
        }
        Ok(())
    }
}

/// Partial update applied to an existing holding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingUpdate {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub avg_buy_price: Option<f64>,
    pub current_price: Option<f64>,
    pub sector: Option<String>,
    pub exchange: Option<String>,
}

/// A user's holdings plus cached valuation fields.
///
/// `version` is bumped by the store on every successful save; a save carrying a
/// stale version is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub user_id: String,
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub daily_change: f64,
    #[serde(default)]
    pub daily_change_percent: f64,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Portfolio {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            holdings: Vec::new(),
            total_value: 0.0,
            daily_change: 0.0,
            daily_change_percent: 0.0,
            last_updated: Utc::now(),
            version: 0,
        }
    }

    pub fn with_holdings(mut self, holdings: Vec<Holding>) -> Self {
        self.holdings = holdings;
        self
    }

    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.holdings.iter().map(|h| h.ticker.clone()).collect();
        tickers.sort();
        tickers.dedup();
        tickers
    }
}

/// Derived valuation and allocation figures for a portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
    /// sector -> percent of total value
    pub sector_allocation: BTreeMap<String, f64>,
    /// asset type -> percent of total value
    pub asset_allocation: BTreeMap<AssetType, f64>,
    pub number_of_holdings: usize,
    pub diversification_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Balanced => "balanced",
            RiskProfile::Aggressive => "aggressive",
        }
    }
}

fn default_alert_threshold() -> f64 {
    5.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub risk_profile: RiskProfile,
    /// Percent move that counts as significant for change alerts
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
    #[serde(default)]
    pub preferred_industries: Vec<String>,
    #[serde(default)]
    pub excluded_industries: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            risk_profile: RiskProfile::default(),
            alert_threshold: default_alert_threshold(),
            preferred_industries: Vec::new(),
            excluded_industries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// A savings target with a deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default = "Utc::now")]
    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub priority: GoalPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default = "default_currency")]
    pub base_currency: String,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            base_currency: default_currency(),
            preferences: Preferences::default(),
            goals: Vec::new(),
        }
    }
}

/// Point-in-time record of a computed analysis, used as the "previous" state by the
/// change detector and as history for anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub user_id: String,
    pub health_score: f64,
    pub total_value: f64,
    pub diversification_score: f64,
    #[serde(default)]
    pub risk_score: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            title: "New Conversation".to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Broad market mood reported by the market-data collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketConditions {
    pub general_sentiment: String,
    pub notable_events: Vec<String>,
}

/// Anonymized community aggregates, keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityData {
    pub averages: BTreeMap<String, f64>,
    pub distribution: BTreeMap<String, Vec<f64>>,
    pub benchmarks: BTreeMap<String, f64>,
}

impl CommunityData {
    pub fn has_metric(&self, metric: &str) -> bool {
        self.averages.contains_key(metric)
            || self.distribution.contains_key(metric)
            || self.benchmarks.contains_key(metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpriced_holding_uses_buy_price() {
        let h = Holding::new(AssetType::Stock, "Infosys", "INFY", 10.0, 1500.0);
        assert_eq!(h.effective_price(), 1500.0);
        assert_eq!(h.current_value(), 15000.0);

        let priced = h.with_current_price(1600.0);
        assert_eq!(priced.current_value(), 16000.0);
        assert_eq!(priced.cost_value(), 15000.0);
    }

    #[test]
    fn test_blank_sector_falls_back_to_other() {
        let h = Holding::new(AssetType::Gold, "Gold ETF", "GOLDBEES", 1.0, 50.0).with_sector("  ");
        assert_eq!(h.sector_key(), "other");
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let h = Holding::new(AssetType::Stock, "TCS", "TCS", -1.0, 3000.0);
        assert!(matches!(h.validate(), Err(FinanceError::InvalidInput(_))));

        let nan = Holding::new(AssetType::Stock, "TCS", "TCS", 1.0, f64::NAN);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_holding_deserializes_with_defaults() {
        let json = r#"{
            "assetType": "mutual_fund",
            "name": "Index Fund",
            "ticker": "NIFTYBEES",
            "quantity": 12,
            "avgBuyPrice": 210.5
        }"#;
        let h: Holding = serde_json::from_str(json).unwrap();
        assert_eq!(h.asset_type, AssetType::MutualFund);
        assert_eq!(h.current_price, 0.0);
        assert_eq!(h.currency, "INR");
        assert!(!h.id.is_empty());
    }

    #[test]
    fn test_asset_allocation_serializes_with_string_keys() {
        let mut metrics = PortfolioMetrics::default();
        metrics.asset_allocation.insert(AssetType::RealEstate, 100.0);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["assetAllocation"]["real_estate"], 100.0);
    }
}
