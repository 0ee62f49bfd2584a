use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FinanceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid metric: {0}")]
    InvalidMetric(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FinanceError {
    /// Errors caused by the request itself. These are surfaced as-is and never retried.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            FinanceError::NotFound(_)
                | FinanceError::InvalidInput(_)
                | FinanceError::InvalidMetric(_)
                | FinanceError::UnknownScenario(_)
        )
    }
}

impl From<serde_json::Error> for FinanceError {
    fn from(err: serde_json::Error) -> Self {
        FinanceError::Storage(format!("serialization: {}", err))
    }
}

pub type FinanceResult<T> = Result<T, FinanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors() {
        assert!(FinanceError::NotFound("portfolio".into()).is_caller_error());
        assert!(FinanceError::UnknownScenario("x".into()).is_caller_error());
        assert!(!FinanceError::CollaboratorUnavailable("timeout".into()).is_caller_error());
        assert!(!FinanceError::Conflict("v1".into()).is_caller_error());
    }
}
