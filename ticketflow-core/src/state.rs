//! State management for ticketflow state machines.

use chrono::{DateTime, Utc};

/// Trait representing a state in a flow.
///
/// States define the current position in the flow and control
/// which transitions are valid.
pub trait FlowState:
    Clone + PartialEq + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static
{
    /// Returns true if this is a terminal state (the flow stops here).
    fn is_terminal(&self) -> bool;

    /// Returns true if this state can transition to the target state.
    ///
    /// The default allows any transition out of a non-terminal state.
    /// Terminal states never have outgoing edges.
    fn can_transition_to(&self, _target: &Self) -> bool {
        !self.is_terminal()
    }
}

/// One recorded edge taken by a flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTransition<S: FlowState> {
    /// Source state
    pub from: S,
    /// Target state
    pub to: S,
    /// Name of the node that produced the transition
    pub node: String,
    /// When the transition was taken
    pub at: DateTime<Utc>,
}

impl<S: FlowState> StateTransition<S> {
    /// Record a transition taken now.
    pub fn new(from: S, to: S, node: impl Into<String>) -> Self {
        Self {
            from,
            to,
            node: node.into(),
            at: Utc::now(),
        }
    }

    /// Check if this transition is allowed by the state graph.
    pub fn is_valid(&self) -> bool {
        self.from.can_transition_to(&self.to)
    }
}
