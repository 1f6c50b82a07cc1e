//! Error types for aidev
//!
//! Centralized error handling using thiserror. Each collaborator has its own
//! error enum; `AidevError` is what crosses module boundaries.

use thiserror::Error;

use crate::jira::TicketError;
use crate::llm::LlmError;
use crate::repo::RepositoryError;

/// All error types that can surface from aidev operations
#[derive(Debug, Error)]
pub enum AidevError {
    /// Model backend failed or returned something unusable
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Source-control backend failed
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Ticket tracker failed
    #[error("Ticket error: {0}")]
    Ticket(#[from] TicketError),

    /// A spawned processing task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for AidevError {
    fn from(err: tokio::task::JoinError) -> Self {
        AidevError::Task(err.to_string())
    }
}

/// Result type alias for aidev operations
pub type Result<T> = std::result::Result<T, AidevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            path: "src/missing.rs".to_string(),
        };
        let err: AidevError = repo_err.into();
        assert!(matches!(err, AidevError::Repository(_)));
        assert!(err.to_string().contains("src/missing.rs"));
    }

    #[test]
    fn test_llm_error_conversion() {
        let err: AidevError = LlmError::InvalidResponse("no tool call".to_string()).into();
        assert!(matches!(err, AidevError::Llm(_)));
        assert!(err.to_string().contains("no tool call"));
    }

    #[test]
    fn test_ticket_error_conversion() {
        let err: AidevError = TicketError::NotFound("REP-1".to_string()).into();
        assert!(matches!(err, AidevError::Ticket(_)));
    }

    #[tokio::test]
    async fn test_join_error_conversion() {
        let handle = tokio::spawn(tokio::time::sleep(std::time::Duration::from_secs(60)));
        handle.abort();
        let join_err = handle.await.unwrap_err();
        let err: AidevError = join_err.into();
        assert!(matches!(err, AidevError::Task(_)));
    }
}
