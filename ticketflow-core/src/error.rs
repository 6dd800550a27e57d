//! Error types for the ticketflow engine.

use thiserror::Error;

/// Result type for flow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Error types that can occur while building or running a flow.
#[derive(Error, Debug)]
pub enum FlowError {
    /// Flow construction error.
    #[error("Construction error: {0}")]
    Construction(String),

    /// A node asked for a transition the state graph does not allow.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// No node is registered for a non-terminal state.
    #[error("No node found for state: {0}")]
    MissingNode(String),

    /// The flow ran more steps than allowed.
    #[error("Flow exceeded maximum steps ({0})")]
    MaxSteps(usize),

    /// A node failed while executing.
    #[error("Node {node} failed: {message}")]
    Node {
        /// Name of the failing node
        node: String,
        /// Failure description
        message: String,
    },

    /// Generic error.
    #[error("Error: {0}")]
    Generic(#[from] eyre::Report),

    /// Flow execution timeout.
    #[error("Flow execution timed out")]
    Timeout,
}

impl FlowError {
    /// Create a new construction error.
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::Construction(msg.into())
    }

    /// Create a node failure.
    pub fn node(node: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Node {
            node: node.into(),
            message: msg.into(),
        }
    }

    /// Create a new invalid transition error.
    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        }
    }

    /// Create a missing node error.
    pub fn missing_node(state: impl std::fmt::Debug) -> Self {
        Self::MissingNode(format!("{state:?}"))
    }
}
