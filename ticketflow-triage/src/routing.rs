//! Triage states and the routing decision.

use serde::{Deserialize, Serialize};
use ticketflow_core::prelude::FlowState;

use crate::ticket::{Category, Sentiment};

/// Handler a classified ticket is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    Technical,
    Billing,
    General,
    Escalate,
}

impl Route {
    /// Every route, in handler order.
    pub const ALL: [Route; 4] = [
        Route::Technical,
        Route::Billing,
        Route::General,
        Route::Escalate,
    ];

    /// Terminal state reached once this route's handler has responded.
    pub fn terminal_state(self) -> TriageState {
        match self {
            Route::Technical => TriageState::TechnicalHandled,
            Route::Billing => TriageState::BillingHandled,
            Route::General => TriageState::GeneralHandled,
            Route::Escalate => TriageState::Escalated,
        }
    }

    /// Lowercase name used in logs and node names.
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Technical => "technical",
            Route::Billing => "billing",
            Route::General => "general",
            Route::Escalate => "escalate",
        }
    }
}

/// Pick the handler for a classified ticket.
///
/// Negative sentiment wins over every category.
pub fn route(category: Category, sentiment: Sentiment) -> Route {
    if sentiment == Sentiment::Negative {
        return Route::Escalate;
    }
    match category {
        Category::Technical => Route::Technical,
        Category::Billing => Route::Billing,
        Category::General => Route::General,
    }
}

/// Position of a ticket in the triage state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriageState {
    Received,
    Categorized,
    SentimentScored,
    Routed(Route),
    TechnicalHandled,
    BillingHandled,
    GeneralHandled,
    Escalated,
    ClassificationFailed,
}

impl TriageState {
    /// Snake-case name used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            TriageState::Received => "received",
            TriageState::Categorized => "categorized",
            TriageState::SentimentScored => "sentiment_scored",
            TriageState::Routed(_) => "routed",
            TriageState::TechnicalHandled => "technical_handled",
            TriageState::BillingHandled => "billing_handled",
            TriageState::GeneralHandled => "general_handled",
            TriageState::Escalated => "escalated",
            TriageState::ClassificationFailed => "classification_failed",
        }
    }
}

impl FlowState for TriageState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            TriageState::TechnicalHandled
                | TriageState::BillingHandled
                | TriageState::GeneralHandled
                | TriageState::Escalated
                | TriageState::ClassificationFailed
        )
    }

    fn can_transition_to(&self, target: &Self) -> bool {
        use TriageState::*;

        match (self, target) {
            (Received, Categorized | ClassificationFailed) => true,
            (Categorized, SentimentScored | ClassificationFailed) => true,
            (SentimentScored, Routed(_)) => true,
            (Routed(route), target) => route.terminal_state() == *target,
            _ => false,
        }
    }
}
