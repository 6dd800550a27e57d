//! # ticketflow-triage
//!
//! Customer-support ticket triage on top of `ticketflow-core`. A query is
//! categorized, scored for sentiment, routed and answered:
//!
//! ```text
//! Received -> Categorized -> SentimentScored -> Routed(route) -> {Technical,Billing,General}Handled
//!     \             \                                        \-> Escalated (negative sentiment)
//!      \-------------\--> ClassificationFailed
//! ```
//!
//! Classification goes through the [`classifier::Classifier`] trait; answers
//! are validated against closed label enums before they touch the ticket.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ticketflow_triage::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let pipeline = TriagePipeline::builder()
//!     .with_config(TriageConfig::default().with_responses(ResponseMode::Template))
//!     .with_classifier(Arc::new(StubClassifier::with_labels("Billing", "Neutral")))
//!     .build()?;
//!
//! let outcome = pipeline.triage("Where can I find my receipt?").await?;
//! assert_eq!(outcome.final_state(), TriageState::BillingHandled);
//! # Ok::<(), TriageError>(())
//! # }).unwrap();
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod llm;
pub mod nodes;
pub mod pipeline;
pub mod prompts;
pub mod responder;
pub mod routing;
pub mod ticket;

#[cfg(test)]
mod pipeline_test;

pub use error::{ClassifierError, Result, TriageError};
pub use pipeline::{ClassificationFailure, TriageOutcome, TriagePipeline, TriageReport};

/// Prelude module for convenient imports
pub mod prelude {
    pub use ticketflow_core::prelude::FlowError;

    pub use crate::{
        classifier::{Classifier, LlmClassifier, StubClassifier, StubReply, normalize_label},
        config::{
            ApiConfig, FailurePolicy, ModelConfig, ModelParameters, ResponseMode, RetryPolicy,
            TriageConfig,
        },
        error::{ClassifierError, Result, TriageError},
        llm::ChatModel,
        pipeline::{
            ClassificationFailure, TriageOutcome, TriagePipeline, TriagePipelineBuilder,
            TriageReport,
        },
        prompts::ESCALATION_MESSAGE,
        responder::{LlmResponder, Responder, TemplateResponder},
        routing::{Route, TriageState, route},
        ticket::{Category, ClassificationStep, Label, Sentiment, Taxonomy, Ticket},
    };
}
