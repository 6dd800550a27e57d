//! The triage pipeline: builds the flow once and runs tickets through it.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use ticketflow_core::prelude::{FlowError, FlowResult, SimpleFlow, helpers};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    classifier::{Classifier, ClassifierCall, LlmClassifier},
    config::{ResponseMode, TriageConfig},
    error::{Result, TriageError},
    llm::ChatModel,
    nodes::{ClassifyNode, HandlerNode, route_ticket},
    responder::{LlmResponder, Responder, TemplateResponder},
    routing::{Route, TriageState, route},
    ticket::{Category, ClassificationStep, Sentiment, Ticket},
};

/// A ticket that reached one of the handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageReport {
    pub ticket_id: Uuid,
    pub query: String,
    pub category: Category,
    pub sentiment: Sentiment,
    pub route: Route,
    pub final_state: TriageState,
    pub response: String,
    /// Steps answered with a fallback label instead of the classifier's.
    pub fallbacks: Vec<ClassificationStep>,
    pub path: Vec<TriageState>,
    pub duration_ms: u64,
}

/// A ticket that could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationFailure {
    pub ticket_id: Uuid,
    pub query: String,
    pub step: ClassificationStep,
    /// The classifier error as reported, not a default label.
    pub error: String,
    /// Set when the category step succeeded before sentiment failed.
    pub category: Option<Category>,
    pub path: Vec<TriageState>,
    pub duration_ms: u64,
}

/// Result of triaging one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriageOutcome {
    Resolved(TriageReport),
    ClassificationFailed(ClassificationFailure),
}

impl TriageOutcome {
    /// Id assigned to the ticket on arrival.
    pub fn ticket_id(&self) -> Uuid {
        match self {
            Self::Resolved(report) => report.ticket_id,
            Self::ClassificationFailed(failure) => failure.ticket_id,
        }
    }

    /// The query as received.
    pub fn query(&self) -> &str {
        match self {
            Self::Resolved(report) => &report.query,
            Self::ClassificationFailed(failure) => &failure.query,
        }
    }

    /// Terminal state the ticket stopped in.
    pub fn final_state(&self) -> TriageState {
        match self {
            Self::Resolved(report) => report.final_state,
            Self::ClassificationFailed(_) => TriageState::ClassificationFailed,
        }
    }

    /// States visited, starting with `Received`.
    pub fn path(&self) -> &[TriageState] {
        match self {
            Self::Resolved(report) => &report.path,
            Self::ClassificationFailed(failure) => &failure.path,
        }
    }

    /// The report, if the ticket was handled.
    pub fn report(&self) -> Option<&TriageReport> {
        match self {
            Self::Resolved(report) => Some(report),
            Self::ClassificationFailed(_) => None,
        }
    }

    /// The failure, if classification did not succeed.
    pub fn failure(&self) -> Option<&ClassificationFailure> {
        match self {
            Self::Resolved(_) => None,
            Self::ClassificationFailed(failure) => Some(failure),
        }
    }

    /// Final response text of a handled ticket.
    pub fn response(&self) -> Option<&str> {
        self.report().map(|report| report.response.as_str())
    }

    fn from_flow(result: FlowResult<TriageState, Ticket>) -> Result<Self> {
        let path = result.path();
        let duration_ms = result.duration.as_millis() as u64;
        let ticket = result.payload;

        if result.final_state == TriageState::ClassificationFailed {
            let failure = ticket.failure().cloned().ok_or_else(|| {
                FlowError::node("triage", "classification failed without a recorded error")
            })?;
            return Ok(Self::ClassificationFailed(ClassificationFailure {
                ticket_id: ticket.id(),
                query: ticket.query().to_string(),
                step: failure.step,
                error: failure.error,
                category: ticket.category(),
                path,
                duration_ms,
            }));
        }

        let (Some(category), Some(sentiment), Some(response)) =
            (ticket.category(), ticket.sentiment(), ticket.response())
        else {
            return Err(FlowError::node(
                "triage",
                format!("ticket {} finished in {:?} incomplete", ticket.id(), result.final_state),
            )
            .into());
        };

        Ok(Self::Resolved(TriageReport {
            ticket_id: ticket.id(),
            query: ticket.query().to_string(),
            category,
            sentiment,
            route: route(category, sentiment),
            final_state: result.final_state,
            response: response.to_string(),
            fallbacks: ticket.fallbacks().to_vec(),
            path,
            duration_ms,
        }))
    }
}

/// Customer-support triage: categorize, score sentiment, route, respond.
///
/// The classifier and responder are shared read-only; tickets share no
/// mutable state, so one pipeline can serve many tickets concurrently.
#[derive(Debug)]
pub struct TriagePipeline {
    flow: SimpleFlow<TriageState, Ticket>,
    config: TriageConfig,
}

impl TriagePipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> TriagePipelineBuilder {
        TriagePipelineBuilder::new()
    }

    /// The validated configuration the pipeline was built with.
    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Triage one query.
    ///
    /// Empty queries fail with [`TriageError::InvalidInput`] before the
    /// classifier is contacted.
    pub async fn triage(&self, query: &str) -> Result<TriageOutcome> {
        let ticket = Ticket::new(query)?;
        let span = info_span!("triage", ticket = %ticket.id());

        async move {
            info!("ticket received");
            let result = self.flow.execute(ticket).await?;
            let outcome = TriageOutcome::from_flow(result)?;

            info!(
                outcome = outcome.final_state().as_str(),
                steps = outcome.path().len().saturating_sub(1),
                "ticket triaged"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("ticketflow_tickets_total", "outcome" => outcome.final_state().as_str())
                .increment(1);

            Ok::<_, TriageError>(outcome)
        }
        .instrument(span)
        .await
    }

    /// Triage several queries concurrently, at most `max_concurrency` at a
    /// time. Results come back in input order.
    pub async fn triage_batch<I, Q>(&self, queries: I) -> Vec<Result<TriageOutcome>>
    where
        I: IntoIterator<Item = Q>,
        Q: AsRef<str>,
    {
        stream::iter(queries)
            .map(|query| async move { self.triage(query.as_ref()).await })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }
}

/// Builder for [`TriagePipeline`].
///
/// Without an explicit classifier or responder, the hosted model from the
/// configuration is used, which requires `model.api.api_key`.
#[derive(Debug, Default)]
pub struct TriagePipelineBuilder {
    config: TriageConfig,
    classifier: Option<Arc<dyn Classifier>>,
    responder: Option<Arc<dyn Responder>>,
}

impl TriagePipelineBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: TriageConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this classifier instead of the hosted model.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Use this responder instead of the one selected by `responses`.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Validate the configuration and assemble the flow.
    pub fn build(self) -> Result<TriagePipeline> {
        self.config.validate()?;

        let needs_model = self.classifier.is_none()
            || (self.responder.is_none() && self.config.responses == ResponseMode::Llm);
        let model = if needs_model {
            Some(Arc::new(ChatModel::new(self.config.model.clone())?))
        } else {
            None
        };

        let classifier = match (self.classifier, &model) {
            (Some(classifier), _) => classifier,
            (None, Some(model)) => Arc::new(LlmClassifier::new(model.clone())),
            (None, None) => return Err(TriageError::configuration("no classifier available")),
        };

        let responder: Arc<dyn Responder> = match (self.responder, &model) {
            (Some(responder), _) => responder,
            (None, _) if self.config.responses == ResponseMode::Template => {
                Arc::new(TemplateResponder)
            }
            (None, Some(model)) => Arc::new(LlmResponder::new(model.clone())),
            (None, None) => return Err(TriageError::configuration("no responder available")),
        };

        let call_timeout = self.config.model.api.timeout();
        let flow = assemble_flow(
            &self.config,
            ClassifierCall::new(classifier, call_timeout, self.config.retry.clone()),
            responder,
            call_timeout,
        )?;

        Ok(TriagePipeline {
            flow,
            config: self.config,
        })
    }
}

fn assemble_flow(
    config: &TriageConfig,
    call: ClassifierCall,
    responder: Arc<dyn Responder>,
    call_timeout: Duration,
) -> Result<SimpleFlow<TriageState, Ticket>> {
    let mut builder = SimpleFlow::builder()
        .name("customer_support_triage")
        .initial_state(TriageState::Received)
        .node(
            TriageState::Received,
            ClassifyNode::<Category>::new(call.clone(), config.failure_policy),
        )
        .node(
            TriageState::Categorized,
            ClassifyNode::<Sentiment>::new(call, config.failure_policy),
        )
        .node(
            TriageState::SentimentScored,
            helpers::router("route", route_ticket),
        );

    for route in Route::ALL {
        builder = builder.node(
            TriageState::Routed(route),
            HandlerNode::new(route, responder.clone(), call_timeout),
        );
    }

    if let Some(timeout) = config.flow_timeout() {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}
