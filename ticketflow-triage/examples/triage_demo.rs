//! Triage a handful of sample queries.
//!
//! ```text
//! cargo run -p ticketflow-triage --example triage_demo [config.yaml]
//! ```
//!
//! With `OPENAI_API_KEY` set the hosted model classifies and answers;
//! otherwise a scripted classifier and canned replies are used.

use std::sync::Arc;

use ticketflow_triage::prelude::*;
use tracing_subscriber::EnvFilter;

const QUERIES: [&str; 5] = [
    "My internet connection keeps dropping.",
    "I need help talking to the chatbot",
    "Where can I find my receipt?",
    "What are your business hours?",
    "",
];

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut config = match std::env::args().nth(1) {
        Some(path) => TriageConfig::from_yaml_file(path)?,
        None => TriageConfig::default(),
    };

    let mut builder = TriagePipeline::builder();
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) => {
            config.model.api = config.model.api.with_api_key(key);
        }
        Err(_) => {
            println!("OPENAI_API_KEY not set, running offline with a scripted classifier\n");
            config = config.with_responses(ResponseMode::Template);
            let stub = StubClassifier::new()
                .reply(ClassificationStep::Category, StubReply::answer("Technical"))
                .reply(ClassificationStep::Category, StubReply::answer("Technical"))
                .reply(ClassificationStep::Category, StubReply::answer("Billing"))
                .reply(ClassificationStep::Category, StubReply::answer("General"))
                .reply(ClassificationStep::Sentiment, StubReply::answer("Negative"))
                .reply(ClassificationStep::Sentiment, StubReply::answer("Neutral"))
                .reply(ClassificationStep::Sentiment, StubReply::answer("Neutral"))
                .reply(ClassificationStep::Sentiment, StubReply::answer("Positive"));
            builder = builder.with_classifier(Arc::new(stub));
        }
    }

    // Sequential so the scripted replies line up with the queries.
    let pipeline = builder
        .with_config(config.with_max_concurrency(1))
        .build()?;

    for (query, result) in QUERIES.iter().zip(pipeline.triage_batch(QUERIES).await) {
        println!("Query: {query:?}");
        match result {
            Ok(outcome) => println!("{}\n", serde_json::to_string_pretty(&outcome)?),
            Err(err) => println!("  rejected: {err}\n"),
        }
    }

    Ok(())
}
