use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use finance_core::*;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::dedup_key_for;

#[derive(Default)]
struct AlertLog {
    next_id: i64,
    alerts: Vec<Alert>,
}

/// Process-local store for tests and offline runs
#[derive(Default)]
pub struct InMemoryStore {
    portfolios: DashMap<String, Portfolio>,
    users: DashMap<String, User>,
    alerts: Mutex<AlertLog>,
    snapshots: DashMap<String, Vec<AnalysisSnapshot>>,
    conversations: DashMap<String, Conversation>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PortfolioStore for InMemoryStore {
    async fn find_portfolio(&self, user_id: &str) -> FinanceResult<Option<Portfolio>> {
        Ok(self.portfolios.get(user_id).map(|p| p.clone()))
    }

    async fn save_portfolio(&self, portfolio: &Portfolio) -> FinanceResult<Portfolio> {
        let mut next = portfolio.clone();
        next.version = portfolio.version + 1;

        let conflict = || {
            FinanceError::Conflict(format!(
                "portfolio for {} changed since version {}",
                portfolio.user_id, portfolio.version
            ))
        };

        match self.portfolios.entry(portfolio.user_id.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().version != portfolio.version {
                    return Err(conflict());
                }
                existing.insert(next.clone());
            }
            Entry::Vacant(slot) => {
                if portfolio.version != 0 {
                    return Err(conflict());
                }
                slot.insert(next.clone());
            }
        }

        Ok(next)
    }

    async fn find_user(&self, user_id: &str) -> FinanceResult<Option<User>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn save_user(&self, user: &User) -> FinanceResult<()> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn insert_alerts(&self, user_id: &str, alerts: &[Alert]) -> FinanceResult<Vec<Alert>> {
        let mut log = self.alerts.lock().await;
        let mut seen: HashSet<String> = log
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.dedup_key.clone())
            .collect();

        let mut inserted = Vec::with_capacity(alerts.len());
        for alert in alerts {
            let mut alert = alert.clone();
            alert.user_id = user_id.to_string();
            alert.dedup_key = dedup_key_for(&alert);
            if !seen.insert(alert.dedup_key.clone()) {
                continue;
            }
            log.next_id += 1;
            alert.id = Some(log.next_id);
            inserted.push(alert);
        }

        log.alerts.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn list_alerts(&self, user_id: &str, query: AlertQuery) -> FinanceResult<Vec<Alert>> {
        let log = self.alerts.lock().await;
        let mut alerts: Vec<Alert> = log
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && (!query.unread_only || !a.is_read))
            .cloned()
            .collect();

        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        alerts.truncate(query.limit);
        Ok(alerts)
    }

    async fn count_unread_alerts(&self, user_id: &str) -> FinanceResult<usize> {
        let log = self.alerts.lock().await;
        Ok(log
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id && !a.is_read)
            .count())
    }

    async fn mark_alert_read(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool> {
        let mut log = self.alerts.lock().await;
        match log
            .alerts
            .iter_mut()
            .find(|a| a.id == Some(alert_id) && a.user_id == user_id)
        {
            Some(alert) => {
                alert.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_alert_actioned(&self, user_id: &str, alert_id: i64) -> FinanceResult<bool> {
        let mut log = self.alerts.lock().await;
        match log
            .alerts
            .iter_mut()
            .find(|a| a.id == Some(alert_id) && a.user_id == user_id)
        {
            Some(alert) => {
                alert.action_taken = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_alerts_read(&self, user_id: &str) -> FinanceResult<u64> {
        let mut log = self.alerts.lock().await;
        let mut updated = 0;
        for alert in log
            .alerts
            .iter_mut()
            .filter(|a| a.user_id == user_id && !a.is_read)
        {
            alert.is_read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn save_snapshot(&self, snapshot: &AnalysisSnapshot) -> FinanceResult<()> {
        self.snapshots
            .entry(snapshot.user_id.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn snapshot_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> FinanceResult<Vec<AnalysisSnapshot>> {
        let mut history = self
            .snapshots
            .get(user_id)
            .map(|s| s.clone())
            .unwrap_or_default();

        // stable sort keeps insertion order for equal timestamps; reverse makes it newest first
        history.sort_by(|a, b| a.taken_at.cmp(&b.taken_at));
        history.reverse();
        history.truncate(limit);
        Ok(history)
    }

    async fn find_conversation(&self, conversation_id: &str) -> FinanceResult<Option<Conversation>> {
        Ok(self.conversations.get(conversation_id).map(|c| c.clone()))
    }

    async fn list_conversations(&self, user_id: &str) -> FinanceResult<Vec<Conversation>> {
        let mut listed: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        listed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(listed)
    }

    async fn save_conversation(&self, conversation: &Conversation) -> FinanceResult<()> {
        self.conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }
}
