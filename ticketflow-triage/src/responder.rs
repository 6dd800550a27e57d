//! Response generation for handled tickets.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::ClassifierError,
    llm::ChatModel,
    prompts,
    routing::Route,
    ticket::Ticket,
};

/// Produces the final reply for a routed ticket.
#[async_trait]
pub trait Responder: Send + Sync + std::fmt::Debug {
    async fn respond(&self, route: Route, ticket: &Ticket) -> Result<String, ClassifierError>;
}

/// Canned per-route replies. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResponder;

#[async_trait]
impl Responder for TemplateResponder {
    async fn respond(&self, route: Route, _ticket: &Ticket) -> Result<String, ClassifierError> {
        Ok(prompts::template_response(route).to_string())
    }
}

/// Asks the hosted model for a route-specific reply.
#[derive(Debug, Clone)]
pub struct LlmResponder {
    model: Arc<ChatModel>,
}

impl LlmResponder {
    /// Answer with the hosted model.
    pub fn new(model: Arc<ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, route: Route, ticket: &Ticket) -> Result<String, ClassifierError> {
        match prompts::response_request(route, ticket.query()) {
            Some(request) => {
                self.model
                    .complete(prompts::SUPPORT_SYSTEM_PROMPT, &request)
                    .await
            }
            None => Ok(prompts::ESCALATION_MESSAGE.to_string()),
        }
    }
}
