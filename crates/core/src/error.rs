//! Error taxonomy shared by every tutoring endpoint and the orchestrator.

use std::time::Duration;

/// Failures that can end a tutoring request.
///
/// All variants are caught at the orchestration boundary and rendered as a
/// readable tutor message; none of them is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TutorError {
    /// A required request field was missing or blank. Raised before any
    /// external call is attempted.
    #[error("{0}")]
    Validation(String),
    /// No credential is configured for the model service.
    #[error("{0}")]
    Configuration(String),
    /// The model output could not be read as JSON by either parse strategy.
    #[error("{0}")]
    ContractViolation(String),
    /// Network or HTTP failure talking to the external service.
    #[error("{0}")]
    Transport(String),
    /// The external call did not settle within the configured bound.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl TutorError {
    /// Short machine-friendly label, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TutorError::Validation(_) => "validation",
            TutorError::Configuration(_) => "configuration",
            TutorError::ContractViolation(_) => "contract_violation",
            TutorError::Transport(_) => "transport",
            TutorError::Timeout(_) => "timeout",
        }
    }
}

impl From<reqwest::Error> for TutorError {
    fn from(err: reqwest::Error) -> Self {
        TutorError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TutorError>;
