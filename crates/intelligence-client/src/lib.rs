pub mod client;
pub mod error;
pub mod models;
pub mod provider;
pub mod scripted;

pub use client::IntelligenceClient;
pub use error::{IntelligenceError, IntelligenceResult};
pub use models::*;
pub use provider::{HttpIntelligence, IntelligenceProvider};
pub use scripted::{Endpoint, ScriptedIntelligence};

use std::time::Duration;

/// Configuration for the intelligence service
#[derive(Debug, Clone)]
pub struct IntelligenceConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl IntelligenceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from `INTELLIGENCE_API_URL` and `INTELLIGENCE_TIMEOUT_SECS`.
    ///
    /// The URL has no default: the engine cannot run against an unknown service.
    pub fn from_env() -> IntelligenceResult<Self> {
        let base_url = std::env::var("INTELLIGENCE_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| IntelligenceError::Config("INTELLIGENCE_API_URL is not set".into()))?;

        let timeout_secs = match std::env::var("INTELLIGENCE_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                IntelligenceError::Config(format!("INTELLIGENCE_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            Err(_) => 10,
        };

        Ok(Self::new(base_url).with_timeout(Duration::from_secs(timeout_secs)))
    }
}

/// Build the HTTP-backed provider from configuration
pub fn http_provider(config: &IntelligenceConfig) -> IntelligenceResult<HttpIntelligence> {
    let client = IntelligenceClient::new(config)?;
    tracing::info!("Intelligence service at {}", client.base_url());
    Ok(HttpIntelligence::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let config = IntelligenceConfig::new("http://localhost:5000/");
        let client = IntelligenceClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_unreachable_service_maps_to_collaborator_unavailable() {
        let config = IntelligenceConfig::new("http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(500));
        let provider = http_provider(&config).unwrap();
        let err = provider
            .detect_anomalies(&[], &[])
            .await
            .expect_err("nothing listens on the discard port");
        let mapped: finance_core::FinanceError = err.into();
        assert!(matches!(
            mapped,
            finance_core::FinanceError::CollaboratorUnavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_silent_service_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and hold the connection without ever answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = IntelligenceConfig::new(format!("http://{}", addr))
            .with_timeout(Duration::from_millis(200));
        let provider = http_provider(&config).unwrap();
        let err = provider
            .detect_anomalies(&[], &[])
            .await
            .expect_err("the server never replies");
        assert!(matches!(err, IntelligenceError::Timeout), "got {:?}", err);

        let mapped: finance_core::FinanceError = err.into();
        assert!(matches!(
            mapped,
            finance_core::FinanceError::CollaboratorUnavailable(_)
        ));
        server.abort();
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        });

        let config = IntelligenceConfig::new(format!("http://{}", addr))
            .with_timeout(Duration::from_secs(2));
        let provider = http_provider(&config).unwrap();
        assert!(!provider.health().await.unwrap());
    }
}
