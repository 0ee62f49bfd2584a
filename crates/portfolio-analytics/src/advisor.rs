use chrono::{DateTime, Utc};
use finance_core::{ChatMessage, ChatRole, Conversation, FinanceError, FinanceResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::analysis::PortfolioAnalyzer;

/// Messages of history sent along with each question
pub const CONTEXT_HISTORY_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorReply {
    pub conversation_id: String,
    pub response: String,
    pub suggestions: Vec<String>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// One line of a user's conversation list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationSummary {
    fn from(conversation: Conversation) -> Self {
        Self {
            last_message: conversation.messages.last().map(|m| m.content.clone()),
            message_count: conversation.messages.len(),
            id: conversation.id,
            title: conversation.title,
            updated_at: conversation.updated_at,
        }
    }
}

/// Conversational advice grounded in the user's portfolio
pub struct AdvisorService {
    analyzer: PortfolioAnalyzer,
}

impl AdvisorService {
    pub fn new(analyzer: PortfolioAnalyzer) -> Self {
        Self { analyzer }
    }

    /// The user's conversations, most recently updated first
    pub async fn conversations(&self, user_id: &str) -> FinanceResult<Vec<ConversationSummary>> {
        let conversations = self.analyzer.store().list_conversations(user_id).await?;
        Ok(conversations.into_iter().map(ConversationSummary::from).collect())
    }

    pub async fn ask(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        message: &str,
    ) -> FinanceResult<AdvisorReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(FinanceError::InvalidInput("message is empty".into()));
        }

        let store = self.analyzer.store();
        let mut conversation = match conversation_id {
            Some(id) => store
                .find_conversation(id)
                .await?
                .filter(|c| c.user_id == user_id)
                .ok_or_else(|| FinanceError::NotFound(format!("conversation {}", id)))?,
            None => Conversation::new(user_id),
        };

        conversation.messages.push(ChatMessage {
            role: ChatRole::User,
            content: message.to_string(),
            timestamp: Utc::now(),
            metadata: None,
        });

        let analysis = self.analyzer.analyze(user_id).await?;
        let user = store
            .find_user(user_id)
            .await?
            .ok_or_else(|| FinanceError::NotFound(format!("user {}", user_id)))?;
        let conditions = self.analyzer.market().market_conditions().await?;

        let history_start = conversation.messages.len().saturating_sub(CONTEXT_HISTORY_LEN);
        let context = json!({
            "userProfile": {
                "riskProfile": user.preferences.risk_profile,
                "goals": user.goals,
                "financialHealthScore": analysis.health_score,
            },
            "portfolioSnapshot": {
                "totalValue": analysis.basic_metrics.total_value,
                "diversification": analysis.basic_metrics.diversification_score,
                "performance": analysis.basic_metrics.total_gain_loss_percent,
            },
            "currentMarketConditions": conditions,
            "conversationHistory": &conversation.messages[history_start..],
        });

        let advice = self.analyzer.intelligence().advise(&context, message).await?;

        let now = Utc::now();
        conversation.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: advice.response.clone(),
            timestamp: now,
            metadata: Some(json!({
                "analysis": advice.analysis,
                "suggestions": advice.suggestions,
                "confidence": advice.confidence,
            })),
        });
        conversation.updated_at = now;
        store.save_conversation(&conversation).await?;

        info!(
            "Advisor answered {} in conversation {} ({} messages)",
            user_id,
            conversation.id,
            conversation.messages.len()
        );

        Ok(AdvisorReply {
            conversation_id: conversation.id,
            response: advice.response,
            suggestions: advice.suggestions,
            confidence: advice.confidence,
            timestamp: now,
        })
    }
}
