//! External subject collaborator boundary.
//!
//! The engine never embeds any concrete subject logic; callers supply
//! an implementation of [`Subject`] wrapping whatever model, pipeline,
//! or service is being measured. Provider fallback chains, rate
//! limiting, and similar plumbing belong inside that implementation,
//! not here.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a subject call can surface to the runner.
#[derive(Debug, Error)]
pub enum SubjectError {
    /// The subject did not answer within the administration timeout.
    #[error("subject timed out after {0:?}")]
    Timeout(Duration),
    /// Transport or provider failure while reaching the subject.
    #[error("subject communication error: {message}")]
    Communication { message: String, retryable: bool },
}

impl SubjectError {
    pub fn communication(message: impl Into<String>, retryable: bool) -> Self {
        Self::Communication {
            message: message.into(),
            retryable,
        }
    }

    /// Whether the runner should retry this call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Communication { retryable, .. } => *retryable,
        }
    }

    /// Short code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Communication { .. } => "communication",
        }
    }
}

/// A black-box method under evaluation.
#[async_trait]
pub trait Subject: Send + Sync {
    /// Identifier carried onto result records.
    fn id(&self) -> &str;

    /// Produce a raw response to an item prompt. `context` carries
    /// optional task-level instructions configured on the runner.
    async fn respond(&self, prompt: &str, context: Option<&str>) -> Result<String, SubjectError>;
}
