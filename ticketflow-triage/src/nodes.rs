//! Flow nodes for the triage state machine.

use std::{marker::PhantomData, sync::Arc, time::Duration};

use async_trait::async_trait;
use ticketflow_core::prelude::{FlowError, Node};
use tracing::{info, warn};

use crate::{
    classifier::ClassifierCall,
    config::FailurePolicy,
    error::Result,
    prompts,
    responder::Responder,
    routing::{Route, TriageState, route},
    ticket::{Category, Label, Sentiment, Ticket},
};

/// A label that can be written onto a ticket by a classification node.
pub trait TicketLabel: Label {
    /// State reached once the label is on the ticket.
    const CLASSIFIED: TriageState;

    fn assign(self, ticket: &mut Ticket) -> Result<()>;
}

impl TicketLabel for Category {
    const CLASSIFIED: TriageState = TriageState::Categorized;

    fn assign(self, ticket: &mut Ticket) -> Result<()> {
        ticket.set_category(self)
    }
}

impl TicketLabel for Sentiment {
    const CLASSIFIED: TriageState = TriageState::SentimentScored;

    fn assign(self, ticket: &mut Ticket) -> Result<()> {
        ticket.set_sentiment(self)
    }
}

/// Runs one classification step and applies the failure policy.
pub struct ClassifyNode<L: TicketLabel> {
    call: ClassifierCall,
    policy: FailurePolicy,
    _label: PhantomData<fn() -> L>,
}

impl<L: TicketLabel> std::fmt::Debug for ClassifyNode<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifyNode")
            .field("step", &L::STEP)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<L: TicketLabel> ClassifyNode<L> {
    /// Classify with `call`, applying `policy` on failure.
    pub fn new(call: ClassifierCall, policy: FailurePolicy) -> Self {
        Self {
            call,
            policy,
            _label: PhantomData,
        }
    }
}

#[async_trait]
impl<L: TicketLabel> Node for ClassifyNode<L> {
    type State = TriageState;
    type Payload = Ticket;

    async fn execute(
        &self,
        mut ticket: Ticket,
    ) -> std::result::Result<(Ticket, TriageState), FlowError> {
        match self.call.run::<L>(ticket.query()).await {
            Ok(label) => {
                label.assign(&mut ticket)?;
                info!(ticket = %ticket.id(), step = %L::STEP, label = %label, "classified");
                Ok((ticket, L::CLASSIFIED))
            }
            Err(err) => match self.policy {
                FailurePolicy::Surface => {
                    warn!(ticket = %ticket.id(), step = %L::STEP, error = %err, "classification failed");
                    ticket.record_failure(L::STEP, err.to_string())?;
                    Ok((ticket, TriageState::ClassificationFailed))
                }
                FailurePolicy::Fallback => {
                    warn!(
                        ticket = %ticket.id(),
                        step = %L::STEP,
                        error = %err,
                        fallback = %L::LOWEST_RISK,
                        "classification failed, using fallback label"
                    );
                    L::LOWEST_RISK.assign(&mut ticket)?;
                    ticket.mark_fallback(L::STEP);
                    Ok((ticket, L::CLASSIFIED))
                }
            },
        }
    }

    fn name(&self) -> String {
        format!("classify_{}", L::STEP)
    }
}

/// Routing decision for a fully classified ticket.
pub fn route_ticket(ticket: &Ticket) -> std::result::Result<TriageState, FlowError> {
    match (ticket.category(), ticket.sentiment()) {
        (Some(category), Some(sentiment)) => Ok(TriageState::Routed(route(category, sentiment))),
        _ => Err(FlowError::node(
            "route",
            format!("ticket {} reached routing unclassified", ticket.id()),
        )),
    }
}

/// Terminal handler for one route. Writes the response exactly once.
pub struct HandlerNode {
    route: Route,
    responder: Arc<dyn Responder>,
    timeout: Duration,
}

impl std::fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerNode")
            .field("route", &self.route)
            .field("responder", &self.responder)
            .finish()
    }
}

impl HandlerNode {
    /// Handler for `route`, bounding each responder call by `timeout`.
    pub fn new(route: Route, responder: Arc<dyn Responder>, timeout: Duration) -> Self {
        Self {
            route,
            responder,
            timeout,
        }
    }

    async fn compose(&self, ticket: &Ticket) -> String {
        if self.route == Route::Escalate {
            return prompts::ESCALATION_MESSAGE.to_string();
        }

        let answer = tokio::time::timeout(self.timeout, self.responder.respond(self.route, ticket))
            .await
            .unwrap_or(Err(crate::error::ClassifierError::Timeout(self.timeout)));

        match answer {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    ticket = %ticket.id(),
                    route = self.route.as_str(),
                    error = %err,
                    "responder failed, using template reply"
                );
                prompts::template_response(self.route).to_string()
            }
        }
    }
}

#[async_trait]
impl Node for HandlerNode {
    type State = TriageState;
    type Payload = Ticket;

    async fn execute(
        &self,
        mut ticket: Ticket,
    ) -> std::result::Result<(Ticket, TriageState), FlowError> {
        let response = self.compose(&ticket).await;
        ticket.set_response(response)?;
        info!(ticket = %ticket.id(), route = self.route.as_str(), "ticket handled");
        Ok((ticket, self.route.terminal_state()))
    }

    fn name(&self) -> String {
        format!("handle_{}", self.route.as_str())
    }
}
