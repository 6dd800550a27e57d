//! Error types for ticket triage.

use std::time::Duration;

use thiserror::Error;
use ticketflow_core::prelude::FlowError;
use uuid::Uuid;

use crate::ticket::ClassificationStep;

/// Result type for triage operations.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Failure reported at the classifier (or responder) boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier call timed out after {0:?}")]
    Timeout(Duration),

    #[error("model error: {0}")]
    Model(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("classifier returned an empty answer")]
    EmptyResponse,

    #[error("{step} answer {raw:?} is not one of the allowed labels")]
    OutOfTaxonomy {
        step: ClassificationStep,
        raw: String,
    },
}

impl ClassifierError {
    /// Model or transport failure.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(message.into())
    }

    /// Transient failures worth another attempt. A well-formed but wrong
    /// answer is not retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::RateLimit(_) | Self::Model(_))
    }

    /// Short name for logging/monitoring.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Model(_) => "model",
            Self::RateLimit(_) => "rate_limit",
            Self::EmptyResponse => "empty_response",
            Self::OutOfTaxonomy { .. } => "out_of_taxonomy",
        }
    }
}

impl From<genai::Error> for ClassifierError {
    fn from(err: genai::Error) -> Self {
        let message = err.to_string();
        if message.contains("429") || message.to_ascii_lowercase().contains("rate limit") {
            Self::RateLimit(message)
        } else {
            Self::Model(message)
        }
    }
}

/// Main error type for triage operations.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Ticket {0} field already set")]
    AlreadySet(&'static str),

    #[error("Ticket {0} is closed")]
    TicketClosed(Uuid),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Configuration file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TriageError {
    /// Rejected caller input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Unusable configuration.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Errors caused by the caller rather than by the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::Configuration(_) | Self::Io(_) | Self::Yaml(_)
        )
    }

    /// Short name for logs and metric labels.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Configuration(_) | Self::Io(_) | Self::Yaml(_) => "configuration",
            Self::AlreadySet(_) | Self::TicketClosed(_) => "ticket_state",
            Self::Flow(_) => "flow",
        }
    }
}

// Integration with ticketflow-core
impl From<TriageError> for FlowError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Flow(inner) => inner,
            TriageError::Configuration(_) => FlowError::construction(err.to_string()),
            other => FlowError::node("triage", other.to_string()),
        }
    }
}
