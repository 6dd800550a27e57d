//! Flow orchestration: runs nodes until a terminal state is reached.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    error::{FlowError, Result},
    node::Node,
    state::{FlowState, StateTransition},
};

/// Default bound on the number of node executions per run.
pub const DEFAULT_MAX_STEPS: usize = 1000;

type SharedNode<S, P> = Arc<dyn Node<State = S, Payload = P>>;

/// Flow execution result.
#[derive(Debug, Clone)]
pub struct FlowResult<S: FlowState, P> {
    /// Terminal state the flow stopped in.
    pub final_state: S,
    /// Payload after the last node ran.
    pub payload: P,
    /// Every edge taken, in order.
    pub transitions: Vec<StateTransition<S>>,
    /// Total execution time.
    pub duration: Duration,
}

impl<S: FlowState, P> FlowResult<S, P> {
    /// Number of nodes executed.
    pub fn steps(&self) -> usize {
        self.transitions.len()
    }

    /// The sequence of states visited, starting with the initial state.
    pub fn path(&self) -> Vec<S> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.first() {
            path.push(first.from.clone());
        }
        path.extend(self.transitions.iter().map(|t| t.to.clone()));
        path
    }
}

/// State machine execution engine.
///
/// Each non-terminal state maps to exactly one node. Transitions returned by
/// nodes are checked against [`FlowState::can_transition_to`] before they are
/// taken.
pub struct SimpleFlow<S: FlowState, P: Send + 'static> {
    nodes: HashMap<S, SharedNode<S, P>>,
    initial_state: S,
    name: String,
    max_steps: usize,
    timeout: Option<Duration>,
}

impl<S: FlowState, P: Send + 'static> std::fmt::Debug for SimpleFlow<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleFlow")
            .field("name", &self.name)
            .field("initial_state", &self.initial_state)
            .field("nodes", &self.nodes.len())
            .field("max_steps", &self.max_steps)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<S: FlowState, P: Send + 'static> SimpleFlow<S, P> {
    /// Create a new flow builder.
    pub fn builder() -> SimpleFlowBuilder<S, P> {
        SimpleFlowBuilder::new()
    }

    /// Execute the flow from its initial state.
    ///
    /// If a deadline was configured, the whole run is bounded by it and
    /// returns [`FlowError::Timeout`] when exceeded.
    pub async fn execute(&self, payload: P) -> Result<FlowResult<S, P>> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(payload))
                .await
                .map_err(|_| FlowError::Timeout)?,
            None => self.run(payload).await,
        }
    }

    async fn run(&self, mut payload: P) -> Result<FlowResult<S, P>> {
        let start_time = Instant::now();
        let mut current_state = self.initial_state.clone();
        let mut transitions = Vec::new();

        while !current_state.is_terminal() {
            if transitions.len() >= self.max_steps {
                return Err(FlowError::MaxSteps(self.max_steps));
            }

            let node = self
                .nodes
                .get(&current_state)
                .ok_or_else(|| FlowError::missing_node(&current_state))?;
            let node_name = node.name();

            #[cfg(feature = "tracing")]
            tracing::debug!(flow = %self.name, node = %node_name, state = ?current_state, "executing node");

            let (next_payload, next_state) = node.execute(payload).await?;

            if !current_state.can_transition_to(&next_state) {
                return Err(FlowError::invalid_transition(&current_state, &next_state));
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(flow = %self.name, from = ?current_state, to = ?next_state, "transition");

            transitions.push(StateTransition::new(
                current_state,
                next_state.clone(),
                node_name,
            ));
            payload = next_payload;
            current_state = next_state;
        }

        Ok(FlowResult {
            final_state: current_state,
            payload,
            transitions,
            duration: start_time.elapsed(),
        })
    }

    /// Get the flow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state every run starts in.
    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }
}

/// Builder for SimpleFlow.
pub struct SimpleFlowBuilder<S: FlowState, P: Send + 'static> {
    nodes: HashMap<S, SharedNode<S, P>>,
    initial_state: Option<S>,
    name: String,
    max_steps: usize,
    timeout: Option<Duration>,
}

impl<S: FlowState, P: Send + 'static> SimpleFlowBuilder<S, P> {
    /// Create a new flow builder.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            initial_state: None,
            name: "simple_flow".to_string(),
            max_steps: DEFAULT_MAX_STEPS,
            timeout: None,
        }
    }

    /// Set the flow name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a node for a specific state.
    pub fn node(mut self, state: S, node: impl Node<State = S, Payload = P> + 'static) -> Self {
        self.nodes.insert(state, Arc::new(node));
        self
    }

    /// Add an already shared node for a specific state.
    pub fn shared_node(mut self, state: S, node: SharedNode<S, P>) -> Self {
        self.nodes.insert(state, node);
        self
    }

    /// Set the initial state.
    pub fn initial_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Bound the number of node executions per run.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Bound the wall-clock time of a whole run.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the flow.
    pub fn build(self) -> Result<SimpleFlow<S, P>> {
        let initial_state = self
            .initial_state
            .ok_or_else(|| FlowError::construction("Initial state not set"))?;

        if self.nodes.is_empty() {
            return Err(FlowError::construction("No nodes added to flow"));
        }

        if let Some(terminal) = self.nodes.keys().find(|state| state.is_terminal()) {
            return Err(FlowError::construction(format!(
                "Node registered for terminal state {terminal:?}"
            )));
        }

        if self.max_steps == 0 {
            return Err(FlowError::construction("max_steps must be at least 1"));
        }

        Ok(SimpleFlow {
            nodes: self.nodes,
            initial_state,
            name: self.name,
            max_steps: self.max_steps,
            timeout: self.timeout,
        })
    }
}

impl<S: FlowState, P: Send + 'static> Default for SimpleFlowBuilder<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::helpers;

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    enum Job {
        Queued,
        Running,
        Done,
        Failed,
    }

    impl FlowState for Job {
        fn is_terminal(&self) -> bool {
            matches!(self, Job::Done | Job::Failed)
        }

        fn can_transition_to(&self, target: &Self) -> bool {
            matches!(
                (self, target),
                (Job::Queued, Job::Running)
                    | (Job::Running, Job::Running | Job::Done | Job::Failed)
            )
        }
    }

    #[tokio::test]
    async fn build_requires_initial_state_and_nodes() {
        let flow = SimpleFlowBuilder::<Job, ()>::new().build();
        assert!(flow.is_err());

        let flow = SimpleFlowBuilder::<Job, ()>::new()
            .initial_state(Job::Queued)
            .build();
        assert!(flow.is_err());
    }

    #[tokio::test]
    async fn build_rejects_nodes_on_terminal_states() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Queued)
            .node(Job::Done, helpers::router("noop", |_: &()| Ok(Job::Failed)))
            .build();

        let err = flow.err().unwrap();
        assert!(err.to_string().contains("terminal state"));
    }

    #[tokio::test]
    async fn runs_to_terminal_state_and_records_path() {
        let flow = SimpleFlowBuilder::new()
            .name("jobs")
            .initial_state(Job::Queued)
            .node(
                Job::Queued,
                helpers::fn_node("start", |n: u32| async move { Ok((n + 1, Job::Running)) }),
            )
            .node(Job::Running, helpers::router("finish", |_: &u32| Ok(Job::Done)))
            .build()
            .unwrap();

        let result = flow.execute(0).await.unwrap();

        assert_eq!(result.final_state, Job::Done);
        assert_eq!(result.payload, 1);
        assert_eq!(result.steps(), 2);
        assert_eq!(result.path(), vec![Job::Queued, Job::Running, Job::Done]);
        assert_eq!(result.transitions[0].node, "start");
        assert_eq!(flow.name(), "jobs");
    }

    #[tokio::test]
    async fn execute_missing_node_yields_error() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Queued)
            .node(Job::Running, helpers::router("finish", |_: &()| Ok(Job::Done)))
            .build()
            .unwrap();

        let err = flow.execute(()).await.unwrap_err();
        assert!(err.to_string().contains("No node found for state"));
    }

    #[tokio::test]
    async fn disallowed_transition_is_rejected() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Queued)
            .node(Job::Queued, helpers::router("skip", |_: &()| Ok(Job::Done)))
            .build()
            .unwrap();

        let err = flow.execute(()).await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn exceeds_max_steps_returns_error() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Running)
            .node(Job::Running, helpers::router("spin", |_: &()| Ok(Job::Running)))
            .max_steps(5)
            .build()
            .unwrap();

        let err = flow.execute(()).await.unwrap_err();
        assert!(matches!(err, FlowError::MaxSteps(5)));
    }

    #[tokio::test]
    async fn node_errors_propagate() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Queued)
            .node(
                Job::Queued,
                helpers::fn_node("explode", |_: ()| async move {
                    Err::<((), Job), _>(FlowError::node("explode", "boom"))
                }),
            )
            .build()
            .unwrap();

        let err = flow.execute(()).await.unwrap_err();
        assert_eq!(err.to_string(), "Node explode failed: boom");
    }

    #[tokio::test]
    async fn whole_run_deadline_is_enforced() {
        let flow = SimpleFlowBuilder::new()
            .initial_state(Job::Queued)
            .node(
                Job::Queued,
                helpers::fn_node("slow", |_: ()| async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(((), Job::Running))
                }),
            )
            .timeout(Duration::from_millis(20))
            .build()
            .unwrap();

        let err = flow.execute(()).await.unwrap_err();
        assert!(matches!(err, FlowError::Timeout));
    }
}
