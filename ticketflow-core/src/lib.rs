//! # ticketflow-core
//!
//! A small, type-safe state machine runner. Flows are tables from states to
//! nodes; every node owns the payload while it runs and decides the next
//! state. The engine checks each edge against the state graph and stops at
//! the first terminal state.
//!
//! ## Core Concepts
//!
//! - **State**: an enum implementing [`state::FlowState`]
//! - **Node**: a unit of work bound to one non-terminal state
//! - **Payload**: the value threaded through the nodes
//! - **Flow**: the runner that applies nodes until a terminal state
//!
//! ## Quick Start
//!
//! ```rust
//! use ticketflow_core::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq, Eq, Hash)]
//! enum Door {
//!     Closed,
//!     Open,
//! }
//!
//! impl FlowState for Door {
//!     fn is_terminal(&self) -> bool {
//!         matches!(self, Door::Open)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let flow = SimpleFlow::builder()
//!     .initial_state(Door::Closed)
//!     .node(Door::Closed, helpers::router("open", |_: &()| Ok(Door::Open)))
//!     .build()?;
//!
//! let result = flow.execute(()).await?;
//! assert_eq!(result.final_state, Door::Open);
//! # Ok::<(), FlowError>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod flow;
pub mod node;
pub mod state;

/// Convenient re-exports for common use.
pub mod prelude {
    pub use async_trait::async_trait;
    pub use eyre;

    pub use crate::{
        error::{FlowError, Result},
        flow::{FlowResult, SimpleFlow, SimpleFlowBuilder},
        node::{FnNode, Node, RouterNode, helpers},
        state::{FlowState, StateTransition},
    };
}
