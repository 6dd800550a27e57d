//! Prompt text sent to the hosted model.

use crate::{
    routing::Route,
    ticket::{ClassificationStep, Taxonomy},
};

/// Fixed reply for escalated tickets. Escalation never calls the model.
pub const ESCALATION_MESSAGE: &str =
    "This query has been escalated to a human agent due to its negative sentiment.";

pub const SUPPORT_SYSTEM_PROMPT: &str =
    "You are a helpful customer support agent. Answer clearly and concisely.";

/// System prompt for one classification step.
pub fn classification_system(taxonomy: &Taxonomy) -> String {
    format!(
        "You are a customer support triage assistant. Answer with exactly one word \
         from this list: {}. Do not add any other text.",
        taxonomy.labels.join(", ")
    )
}

/// User prompt asking for one label of `taxonomy`.
pub fn classification_request(taxonomy: &Taxonomy, query: &str) -> String {
    match taxonomy.step {
        ClassificationStep::Category => format!(
            "Categorize the following customer query into one of these categories: {}. Query: {query}",
            taxonomy.labels.join(", ")
        ),
        ClassificationStep::Sentiment => format!(
            "Analyze the sentiment of the following customer query. Respond with either {}. Query: {query}",
            quoted_alternatives(taxonomy.labels)
        ),
    }
}

/// Instruction for a route's handler, or `None` for escalation.
pub fn response_request(route: Route, query: &str) -> Option<String> {
    let kind = match route {
        Route::Technical => "technical support",
        Route::Billing => "billing support",
        Route::General => "general support",
        Route::Escalate => return None,
    };
    Some(format!(
        "Provide a {kind} response to the following query: {query}"
    ))
}

/// Canned reply used when no model answer is available.
pub fn template_response(route: Route) -> &'static str {
    match route {
        Route::Technical => {
            "Thanks for reaching out. Our technical team has received your request and will \
             follow up with troubleshooting steps shortly."
        }
        Route::Billing => {
            "Thanks for reaching out. Our billing team has received your request and will \
             follow up about your account shortly."
        }
        Route::General => {
            "Thanks for reaching out. A member of our support team will get back to you shortly."
        }
        Route::Escalate => ESCALATION_MESSAGE,
    }
}

// 'A', 'B', or 'C'
fn quoted_alternatives(labels: &[&str]) -> String {
    let quoted: Vec<String> = labels.iter().map(|l| format!("'{l}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{}, or {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
