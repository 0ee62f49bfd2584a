use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use finance_core::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::dedup_key_for;

fn storage(err: sqlx::Error) -> FinanceError {
    FinanceError::Storage(err.to_string())
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// SQLite-backed document store. Each entity is one JSON document per row; the
/// columns next to it only exist for keys, ordering and flags.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new database connection
    pub async fn new(database_url: &str) -> FinanceResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage)?
            .create_if_missing(true);

        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!("SQLite store ready at {}", database_url);

        Ok(store)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> FinanceResult<()> {
        let schema = include_str!("../schema.sql");

        // sqlx executes one statement per query
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(storage)?;
            }
        }

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode_alert(id: i64, is_read: bool, action_taken: bool, document: &str) -> FinanceResult<Alert> {
        let mut alert: Alert = serde_json::from_str(document)?;
        alert.id = Some(id);
        alert.is_read = is_read;
        alert.action_taken = action_taken;
        Ok(alert)
    }
}

#[async_trait]
impl PortfolioStore for SqliteStore {
    async fn find_portfolio(&self, user_id: &str) -> FinanceResult<Option<Portfolio>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM portfolios WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;

        row.map(|(doc,)| serde_json::from_str(&doc).map_err(FinanceError::from))
            .transpose()
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> FinanceResult<Portfolio> {
        let mut next = portfolio.clone();
        next.version = portfolio.version + 1;
        let document = serde_json::to_string(&next)?;

        let result = if portfolio.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO portfolios (user_id, version, document)
                VALUES (?, ?, ?)
                ON CONFLICT(user_id) DO NOTHING
                "#,
            )
            .bind(&next.user_id)
            .bind(next.version as i64)
            .bind(&document)
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                UPDATE portfolios
                SET version = ?, document = ?, updated_at = datetime('now')
                WHERE user_id = ? AND version = ?
                "#,
            )
            .bind(next.version as i64)
            .bind(&document)
            .bind(&next.user_id)
            .bind(portfolio.version as i64)
            .execute(&self.pool)
            .await
        }
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(FinanceError::Conflict(format!(
                "portfolio for {} changed since version {}",
                portfolio.user_id, portfolio.version
            )));
        }

        Ok(next)
    }

    async fn find_user(&self, user_id: &str) -> FinanceResult<Option<User>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT document FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.map(|(doc,)| serde_json::from_str(&doc).map_err(FinanceError::from))
            .transpose()
    }

    async fn save_user(&self, user: &User) -> FinanceResult<()> {
        let document = serde_json::to_string(user)?;
        sqlx::query(
            r#"
            INSERT INTO users (user_id, document) VALUES (?, ?)
            ON CONFLICT(user_id) DO UPDATE SET document = excluded.document
            "#,
        )
        .bind(&user.id)
        .bind(&document)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn insert_alerts(&self, user_id: &str, alerts: &[Alert]) -> FinanceResult<Vec<Alert>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let mut inserted = Vec::with_capacity(alerts.len());

        for alert in alerts {
            let mut alert = alert.clone();
            alert.user_id = user_id.to_string();
            alert.dedup_key = dedup_key_for(&alert);
            let document = serde_json::to_string(&alert)?;

            let row: Option<(i64,)> = sqlx::query_as(
                r#"
                INSERT INTO alerts (user_id, dedup_key, is_read, action_taken, created_at, document)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, dedup_key) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(user_id)
            .bind(&alert.dedup_key)
            .bind(alert.is_read)
            .bind(alert.action_taken)
            .bind(timestamp(&alert.created_at))
            .bind(&document)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?;

            if let Some((id,)) = row {
                alert.id = Some(id);
                inserted.push(alert);
            }
        }

        tx.commit().await.map_err(storage)?;
        Ok(inserted)
    }

    async fn list_alerts(&self, user_id: &str, query: AlertQuery) -> FinanceResult<Vec<Alert>> {
        let sql = if query.unread_only {
            "SELECT id, is_read, action_taken, document FROM alerts WHERE user_id = ? AND is_read = 0 ORDER BY created_at DESC, id DESC LIMIT ?"
        } else {
            "SELECT id, is_read, action_taken, document FROM alerts WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        };

        let rows: Vec<(i64, bool, bool, String)> = sqlx::query_as(sql)
            .bind(user_id)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        rows.iter()
            .map(|(id, is_read, action_taken, doc)| Self::decode_alert(*id, *is_read, *action_taken, doc))
            .collect()
    }

    async fn count_unread_alerts(&self, user_id: &str) -> FinanceResult<usize> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM alerts WHERE user_id = ? AND is_read = 0")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(storage)?;

        Ok(count.max(0) as usize)
    }

    async fn mark_alert_read(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool> {
        let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(alert_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_alert_actioned(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool> {
        let result = sqlx::query("UPDATE alerts SET action_taken = 1 WHERE id = ? AND user_id = ?")
            .bind(alert_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_alerts_read(&self, user_id: &str) -> FinanceResult<u64> {
        let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected())
    }

    async fn save_snapshot(&self, snapshot: &AnalysisSnapshot) -> FinanceResult<()> {
        let document = serde_json::to_string(snapshot)?;
        sqlx::query("INSERT INTO analysis_snapshots (user_id, taken_at, document) VALUES (?, ?, ?)")
            .bind(&snapshot.user_id)
            .bind(timestamp(&snapshot.taken_at))
            .bind(&document)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }

    async fn snapshot_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> FinanceResult<Vec<AnalysisSnapshot>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT document FROM analysis_snapshots WHERE user_id = ? ORDER BY taken_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|(doc,)| serde_json::from_str(doc).map_err(FinanceError::from))
            .collect()
    }

    async fn find_conversation(&self, conversation_id: &str) -> FinanceResult<Option<Conversation>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT document FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.map(|(doc,)| serde_json::from_str(&doc).map_err(FinanceError::from))
            .transpose()
    }

    async fn list_conversations(&self, user_id: &str) -> FinanceResult<Vec<Conversation>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT document FROM conversations WHERE user_id = ? ORDER BY updated_at DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|(doc,)| serde_json::from_str(doc).map_err(FinanceError::from))
            .collect()
    }

    async fn save_conversation(&self, conversation: &Conversation) -> FinanceResult<()> {
        let document = serde_json::to_string(conversation)?;
        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, updated_at, document) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                document = excluded.document
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(timestamp(&conversation.updated_at))
        .bind(&document)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn sample_alert(metric: &str) -> Alert {
        Alert::new(AlertType::Rebalance, AlertSeverity::Medium, "Concentrated", "Too much in one sector")
            .with_metric(metric)
    }

    #[tokio::test]
    async fn test_db_creation() {
        let store = setup_test_db().await;
        assert!(store.pool().acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_portfolio_version_check() {
        let store = setup_test_db().await;
        let portfolio = Portfolio::new("user-1").with_holdings(vec![Holding::new(
            AssetType::Stock,
            "HDFC Bank",
            "HDFCBANK",
            5.0,
            1600.0,
        )]);

        let saved = store.save_portfolio(&portfolio).await.unwrap();
        assert_eq!(saved.version, 1);

        // a second "create" loses
        let err = store.save_portfolio(&portfolio).await.unwrap_err();
        assert!(matches!(err, FinanceError::Conflict(_)));

        let updated = store.save_portfolio(&saved).await.unwrap();
        assert_eq!(updated.version, 2);

        // writing from the stale copy is rejected
        assert!(matches!(
            store.save_portfolio(&saved).await,
            Err(FinanceError::Conflict(_))
        ));

        let found = store.find_portfolio("user-1").await.unwrap().unwrap();
        assert_eq!(found.version, 2);
        assert_eq!(found.holdings.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_alerts_skips_known_keys() {
        let store = setup_test_db().await;
        let first = store
            .insert_alerts("user-1", &[sample_alert("sector:tech"), sample_alert("sector:energy")])
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|a| a.id.is_some() && a.user_id == "user-1"));

        let again = store
            .insert_alerts("user-1", &[sample_alert("sector:tech")])
            .await
            .unwrap();
        assert!(again.is_empty());

        // same key for another user is fine
        let other = store
            .insert_alerts("user-2", &[sample_alert("sector:tech")])
            .await
            .unwrap();
        assert_eq!(other.len(), 1);

        assert_eq!(store.count_unread_alerts("user-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_alerts_read() {
        let store = setup_test_db().await;
        let inserted = store
            .insert_alerts("user-1", &[sample_alert("a"), sample_alert("b"), sample_alert("c")])
            .await
            .unwrap();
        let id = inserted[0].id.unwrap();

        assert!(store.mark_alert_read("user-1", id).await.unwrap());
        assert!(!store.mark_alert_read("user-2", id).await.unwrap());
        assert_eq!(store.count_unread_alerts("user-1").await.unwrap(), 2);

        let unread = store
            .list_alerts("user-1", AlertQuery { limit: 10, unread_only: true })
            .await
            .unwrap();
        assert_eq!(unread.len(), 2);
        assert!(unread.iter().all(|a| !a.is_read));

        assert_eq!(store.mark_all_alerts_read("user-1").await.unwrap(), 2);
        assert_eq!(store.count_unread_alerts("user-1").await.unwrap(), 0);

        assert!(store.mark_alert_actioned("user-1", id).await.unwrap());
        let all = store.list_alerts("user-1", AlertQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|a| a.id == Some(id) && a.action_taken));
    }

    #[tokio::test]
    async fn test_snapshot_history_newest_first() {
        let store = setup_test_db().await;
        let base = Utc::now();
        for (i, score) in [60.0, 65.0, 70.0].iter().enumerate() {
            store
                .save_snapshot(&AnalysisSnapshot {
                    user_id: "user-1".to_string(),
                    health_score: *score,
                    total_value: 1000.0,
                    diversification_score: 50.0,
                    risk_score: None,
                    taken_at: base + chrono::Duration::minutes(i as i64),
                })
                .await
                .unwrap();
        }

        let history = store.snapshot_history("user-1", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].health_score, 70.0);
        assert_eq!(history[1].health_score, 65.0);
    }

    #[tokio::test]
    async fn test_user_and_conversation_round_trip() {
        let store = setup_test_db().await;
        let user = User::new("user-1", "asha@example.com", "Asha");
        store.save_user(&user).await.unwrap();
        assert_eq!(store.find_user("user-1").await.unwrap(), Some(user));
        assert!(store.find_user("missing").await.unwrap().is_none());

        let mut conversation = Conversation::new("user-1");
        store.save_conversation(&conversation).await.unwrap();
        conversation.title = "Retirement".to_string();
        store.save_conversation(&conversation).await.unwrap();

        let found = store.find_conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Retirement");
    }

    #[tokio::test]
    async fn test_list_conversations_most_recent_first() {
        let store = setup_test_db().await;
        let base = Utc::now();
        let mut older = Conversation::new("user-1");
        older.updated_at = base;
        let mut newer = Conversation::new("user-1");
        newer.updated_at = base + chrono::Duration::minutes(5);
        store.save_conversation(&older).await.unwrap();
        store.save_conversation(&newer).await.unwrap();
        store.save_conversation(&Conversation::new("user-2")).await.unwrap();

        let listed = store.list_conversations("user-1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);

        // touching the older one moves it to the front
        older.updated_at = base + chrono::Duration::minutes(10);
        store.save_conversation(&older).await.unwrap();
        let listed = store.list_conversations("user-1").await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert!(store.list_conversations("nobody").await.unwrap().is_empty());
    }
}
