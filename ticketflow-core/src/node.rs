//! Node abstraction for ticketflow state machines.

use std::{fmt::Debug, future::Future, marker::PhantomData, pin::Pin};

use async_trait::async_trait;

use crate::{error::Result, state::FlowState};

/// Boxed future returned by [`FnNode`] closures.
pub type NodeFuture<P, S> = Pin<Box<dyn Future<Output = Result<(P, S)>> + Send>>;

/// Trait for flow nodes.
///
/// A node is the unit of work bound to one state. It takes ownership of the
/// payload, performs its operation, and hands back the payload along with
/// the next state.
#[async_trait]
pub trait Node: Send + Sync + Debug {
    /// The state type this node works with.
    type State: FlowState;

    /// The payload threaded through the flow.
    type Payload: Send + 'static;

    /// Execute the node's logic.
    async fn execute(&self, payload: Self::Payload) -> Result<(Self::Payload, Self::State)>;

    /// Get the name of this node for logging.
    fn name(&self) -> String {
        format!("{self:?}")
    }
}

/// A node that wraps an async closure.
pub struct FnNode<F, P, S>
where
    F: Fn(P) -> NodeFuture<P, S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    func: F,
    name: String,
    _phantom: PhantomData<fn(P) -> S>,
}

impl<F, P, S> Debug for FnNode<F, P, S>
where
    F: Fn(P) -> NodeFuture<P, S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnNode").field("name", &self.name).finish()
    }
}

impl<F, P, S> FnNode<F, P, S>
where
    F: Fn(P) -> NodeFuture<P, S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    /// Create a new functional node.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            func,
            name: name.into(),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, P, S> Node for FnNode<F, P, S>
where
    F: Fn(P) -> NodeFuture<P, S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    type State = S;
    type Payload = P;

    async fn execute(&self, payload: P) -> Result<(P, S)> {
        (self.func)(payload).await
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// A node that picks the next state with a pure function of the payload.
///
/// Router nodes never modify the payload. The decision may still fail when
/// the payload lacks what it needs.
pub struct RouterNode<F, P, S>
where
    F: Fn(&P) -> Result<S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    decide: F,
    name: String,
    _phantom: PhantomData<fn(P) -> S>,
}

impl<F, P, S> Debug for RouterNode<F, P, S>
where
    F: Fn(&P) -> Result<S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterNode").field("name", &self.name).finish()
    }
}

impl<F, P, S> RouterNode<F, P, S>
where
    F: Fn(&P) -> Result<S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    /// Create a new router node.
    pub fn new(name: impl Into<String>, decide: F) -> Self {
        Self {
            decide,
            name: name.into(),
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, P, S> Node for RouterNode<F, P, S>
where
    F: Fn(&P) -> Result<S> + Send + Sync,
    P: Send + 'static,
    S: FlowState,
{
    type State = S;
    type Payload = P;

    async fn execute(&self, payload: P) -> Result<(P, S)> {
        let next = (self.decide)(&payload)?;
        Ok((payload, next))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Helper functions for creating common node types.
pub mod helpers {
    use super::*;

    /// Create a functional node from an async closure.
    #[allow(clippy::type_complexity)]
    pub fn fn_node<F, Fut, P, S>(
        name: impl Into<String>,
        f: F,
    ) -> FnNode<impl Fn(P) -> NodeFuture<P, S> + Send + Sync, P, S>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(P, S)>> + Send + 'static,
        P: Send + 'static,
        S: FlowState,
    {
        FnNode::new(name, move |payload| -> NodeFuture<P, S> {
            Box::pin(f(payload))
        })
    }

    /// Create a router node from a decision function.
    pub fn router<F, P, S>(name: impl Into<String>, decide: F) -> RouterNode<F, P, S>
    where
        F: Fn(&P) -> Result<S> + Send + Sync,
        P: Send + 'static,
        S: FlowState,
    {
        RouterNode::new(name, decide)
    }
}
