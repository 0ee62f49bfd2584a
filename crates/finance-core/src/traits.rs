use async_trait::async_trait;
use std::collections::HashMap;

use crate::{
    Alert, AlertQuery, AnalysisSnapshot, CommunityData, Conversation, FinanceResult,
    MarketConditions, Portfolio, User,
};

/// Document store keyed by user id
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn find_portfolio(&self, user_id: &str) -> FinanceResult<Option<Portfolio>>;

    /// Persist `portfolio` if its `version` still matches the stored one and return the
    /// saved copy with the bumped version. A fresh portfolio (version 0) must not
    /// already exist. Fails with `Conflict` otherwise.
    async fn save_portfolio(&self, portfolio: &Portfolio) -> FinanceResult<Portfolio>;

    async fn find_user(&self, user_id: &str) -> FinanceResult<Option<User>>;

    async fn save_user(&self, user: &User) -> FinanceResult<()>;

    /// Insert a batch atomically. Alerts whose `dedup_key` is already stored for the
    /// user are skipped; the returned alerts carry their assigned ids.
    async fn insert_alerts(&self, user_id: &str, alerts: &[Alert]) -> FinanceResult<Vec<Alert>>;

    /// Newest first
    async fn list_alerts(&self, user_id: &str, query: AlertQuery) -> FinanceResult<Vec<Alert>>;

    async fn count_unread_alerts(&self, user_id: &str) -> FinanceResult<usize>;

    /// Returns false when no such alert exists for the user.
    async fn mark_alert_read(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool>;

    async fn mark_alert_actioned(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool>;

    async fn mark_all_alerts_read(&self, user_id: &str) -> FinanceResult<u64>;

    async fn save_snapshot(&self, snapshot: &AnalysisSnapshot) -> FinanceResult<()>;

    /// Newest first, at most `limit` entries
    async fn snapshot_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> FinanceResult<Vec<AnalysisSnapshot>>;

    async fn find_conversation(&self, conversation_id: &str) -> FinanceResult<Option<Conversation>>;

    /// The user's conversations, most recently updated first
    async fn list_conversations(&self, user_id: &str) -> FinanceResult<Vec<Conversation>>;

    async fn save_conversation(&self, conversation: &Conversation) -> FinanceResult<()>;
}

/// Price feed. Implementations may return a subset of the requested tickers.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn current_prices(&self, tickers: &[String]) -> FinanceResult<HashMap<String, f64>>;

    async fn market_conditions(&self) -> FinanceResult<MarketConditions>;
}

/// Source of anonymized aggregates across all users
#[async_trait]
pub trait CommunityDataSource: Send + Sync {
    async fn aggregated(&self) -> FinanceResult<CommunityData>;
}
