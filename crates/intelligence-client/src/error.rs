use finance_core::FinanceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelligenceError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for IntelligenceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            IntelligenceError::Timeout
        } else {
            IntelligenceError::RequestFailed(err)
        }
    }
}

/// Every intelligence failure looks the same to the engine.
impl From<IntelligenceError> for FinanceError {
    fn from(err: IntelligenceError) -> Self {
        FinanceError::CollaboratorUnavailable(format!("intelligence service: {}", err))
    }
}

pub type IntelligenceResult<T> = Result<T, IntelligenceError>;
