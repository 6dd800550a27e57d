use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};
use tracing_test::traced_test;

use crate::{
    llm::stub_server::{completion, serve},
    prelude::*,
    prompts,
};

fn config() -> TriageConfig {
    let mut config = TriageConfig::default()
        .with_responses(ResponseMode::Template)
        .with_retry(RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        });
    config.model.api.timeout_ms = 20;
    config
}

fn pipeline(stub: &Arc<StubClassifier>, config: TriageConfig) -> TriagePipeline {
    TriagePipeline::builder()
        .with_config(config)
        .with_classifier(stub.clone())
        .build()
        .unwrap()
}

async fn triage_with(category: &str, sentiment: &str, query: &str) -> TriageOutcome {
    let stub = Arc::new(StubClassifier::with_labels(category, sentiment));
    pipeline(&stub, config()).triage(query).await.unwrap()
}

#[derive(Debug)]
struct DownResponder;

#[async_trait]
impl Responder for DownResponder {
    async fn respond(
        &self,
        _route: Route,
        _ticket: &Ticket,
    ) -> std::result::Result<String, ClassifierError> {
        Err(ClassifierError::rate_limit("429 Too Many Requests"))
    }
}

#[tokio::test]
async fn negative_sentiment_overrides_category() {
    let outcome = triage_with("Technical", "Negative", "My internet connection keeps dropping.").await;

    let report = outcome.report().unwrap();
    assert_eq!(report.final_state, TriageState::Escalated);
    assert_eq!(report.category, Category::Technical);
    assert_eq!(report.route, Route::Escalate);
    assert_eq!(report.response, ESCALATION_MESSAGE);
    assert_eq!(
        report.path,
        vec![
            TriageState::Received,
            TriageState::Categorized,
            TriageState::SentimentScored,
            TriageState::Routed(Route::Escalate),
            TriageState::Escalated,
        ]
    );
}

#[tokio::test]
async fn neutral_technical_query_is_handled_technically() {
    let outcome = triage_with("Technical", "Neutral", "I need help talking to the chatbot").await;

    assert_eq!(outcome.final_state(), TriageState::TechnicalHandled);
    assert_eq!(
        outcome.response(),
        Some(prompts::template_response(Route::Technical))
    );
}

#[tokio::test]
async fn billing_query_is_handled_by_billing() {
    let outcome = triage_with("Billing", "Neutral", "Where can I find my receipt?").await;

    assert_eq!(outcome.final_state(), TriageState::BillingHandled);
    assert_eq!(outcome.report().unwrap().sentiment, Sentiment::Neutral);
}

#[tokio::test]
async fn positive_general_query_is_handled_generally() {
    let outcome = triage_with("General", "Positive", "What are your business hours?").await;

    assert_eq!(outcome.final_state(), TriageState::GeneralHandled);
    assert!(outcome.report().unwrap().fallbacks.is_empty());
}

#[tokio::test]
async fn category_timeout_surfaces_a_classification_failure() {
    let stub = Arc::new(
        StubClassifier::new()
            .reply(ClassificationStep::Category, StubReply::Hang)
            .reply(ClassificationStep::Sentiment, StubReply::answer("Neutral")),
    );

    let outcome = pipeline(&stub, config())
        .triage("My internet connection keeps dropping.")
        .await
        .unwrap();

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step, ClassificationStep::Category);
    assert_eq!(failure.category, None);
    assert!(failure.error.contains("timed out"), "{}", failure.error);
    assert_eq!(
        failure.path,
        vec![TriageState::Received, TriageState::ClassificationFailed]
    );
    // Both attempts were spent on the category; sentiment was never asked.
    assert_eq!(stub.calls(ClassificationStep::Category), 2);
    assert_eq!(stub.calls(ClassificationStep::Sentiment), 0);
}

#[tokio::test]
async fn sentiment_failure_keeps_the_category() {
    let stub = Arc::new(StubClassifier::with_labels("Billing", "Furious"));

    let outcome = pipeline(&stub, config()).triage("Refund me now").await.unwrap();

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.step, ClassificationStep::Sentiment);
    assert_eq!(failure.category, Some(Category::Billing));
    assert!(failure.error.contains("Furious"));
    assert_eq!(outcome.response(), None);
}

#[tokio::test]
async fn fallback_policy_continues_with_lowest_risk_labels() {
    let stub = Arc::new(StubClassifier::with_labels("Urgent", "???"));
    let config = config().with_failure_policy(FailurePolicy::Fallback);

    let outcome = pipeline(&stub, config).triage("hello?").await.unwrap();

    let report = outcome.report().unwrap();
    assert_eq!(report.category, Category::General);
    assert_eq!(report.sentiment, Sentiment::Neutral);
    assert_eq!(report.final_state, TriageState::GeneralHandled);
    assert_eq!(
        report.fallbacks,
        vec![ClassificationStep::Category, ClassificationStep::Sentiment]
    );
}

#[tokio::test]
async fn empty_query_never_reaches_the_classifier() {
    let stub = Arc::new(StubClassifier::with_labels("General", "Neutral"));
    let pipeline = pipeline(&stub, config());

    for query in ["", "   ", "\n\t"] {
        let err = assert_err!(pipeline.triage(query).await);
        assert!(matches!(err, TriageError::InvalidInput(_)));
    }
    assert_eq!(stub.total_calls(), 0);
}

#[tokio::test]
async fn responder_failure_falls_back_to_template() {
    let stub = Arc::new(StubClassifier::with_labels("Billing", "Positive"));
    let pipeline = TriagePipeline::builder()
        .with_config(config().with_responses(ResponseMode::Llm))
        .with_classifier(stub)
        .with_responder(Arc::new(DownResponder))
        .build()
        .unwrap();

    let outcome = assert_ok!(pipeline.triage("Can I pay by invoice?").await);

    assert_eq!(outcome.final_state(), TriageState::BillingHandled);
    assert_eq!(outcome.response(), Some(prompts::template_response(Route::Billing)));
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let stub = Arc::new(StubClassifier::with_labels("General", "Positive"));
    let pipeline = pipeline(&stub, config().with_max_concurrency(2));
    let queries = ["first", "second", "", "fourth", "fifth"];

    let results = pipeline.triage_batch(queries).await;

    assert_eq!(results.len(), queries.len());
    for (query, result) in queries.iter().zip(&results) {
        match result {
            Ok(outcome) => assert_eq!(outcome.query(), *query),
            Err(err) => {
                assert_eq!(*query, "");
                assert!(err.is_user_error());
            }
        }
    }
    assert_eq!(stub.calls(ClassificationStep::Category), 4);
}

#[tokio::test]
async fn stubbed_runs_are_reproducible() {
    let stub = Arc::new(StubClassifier::with_labels("Technical", "Neutral"));
    let pipeline = pipeline(&stub, config());

    let first = pipeline.triage("The app crashes on start").await.unwrap();
    let second = pipeline.triage("The app crashes on start").await.unwrap();

    assert_ne!(first.ticket_id(), second.ticket_id());
    assert_eq!(first.final_state(), second.final_state());
    assert_eq!(first.path(), second.path());
    assert_eq!(first.response(), second.response());
}

#[tokio::test]
async fn whole_flow_deadline_is_reported_as_an_error() {
    let stub = Arc::new(StubClassifier::new().reply(ClassificationStep::Category, StubReply::Hang));
    let mut config = config().with_flow_timeout(Duration::from_millis(10));
    config.model.api.timeout_ms = 5_000;

    let err = pipeline(&stub, config).triage("slow").await.unwrap_err();

    assert!(matches!(err, TriageError::Flow(FlowError::Timeout)));
}

#[tokio::test]
async fn invalid_configuration_is_rejected_at_build() {
    let stub = Arc::new(StubClassifier::new());
    let err = TriagePipeline::builder()
        .with_config(config().with_max_concurrency(0))
        .with_classifier(stub)
        .build()
        .unwrap_err();

    assert_eq!(err.category(), "configuration");
}

#[tokio::test]
async fn hosted_model_requires_an_explicit_key() {
    let err = TriagePipeline::builder()
        .with_config(TriageConfig::default())
        .build()
        .unwrap_err();
    assert_eq!(err.category(), "configuration");

    let stub = Arc::new(StubClassifier::with_labels("Billing", "Neutral"));
    let err = TriagePipeline::builder()
        .with_config(config().with_responses(ResponseMode::Llm))
        .with_classifier(stub.clone())
        .build()
        .unwrap_err();
    assert_eq!(err.category(), "configuration");

    assert_ok!(
        TriagePipeline::builder()
            .with_config(config())
            .with_classifier(stub)
            .build()
    );
}

#[tokio::test]
async fn hosted_pipeline_classifies_and_answers() {
    let server = serve(vec![
        ("200 OK", completion("Technical")),
        ("200 OK", completion("Sentiment: Neutral")),
        ("200 OK", completion("Restart your router.")),
    ])
    .await;
    let config = TriageConfig::new(server.model_config()).with_retry(RetryPolicy::none());
    let pipeline = TriagePipeline::builder().with_config(config).build().unwrap();

    let outcome = pipeline.triage("My router keeps rebooting").await.unwrap();
    assert_eq!(outcome.final_state(), TriageState::TechnicalHandled);
    assert_eq!(outcome.response(), Some("Restart your router."));

    let requests = server.requests.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].contains("Categorize the following customer query"));
    assert!(requests[1].contains("Analyze the sentiment of the following customer query"));
    assert!(requests[2].contains("Provide a technical support response"));
}

#[tokio::test]
async fn outcomes_serialize_with_a_status_tag() {
    let resolved = triage_with("Billing", "Neutral", "Where can I find my receipt?").await;
    let json = serde_json::to_value(&resolved).unwrap();
    assert_eq!(json["status"], "resolved");
    assert_eq!(json["category"], "Billing");

    let stub = Arc::new(StubClassifier::with_labels("Urgent", "Neutral"));
    let failed = pipeline(&stub, config()).triage("??").await.unwrap();
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["status"], "classification_failed");
    assert_eq!(json["step"], "category");
}

#[tokio::test]
#[traced_test]
async fn logs_each_ticket_with_its_outcome() {
    let stub = Arc::new(StubClassifier::with_labels("Urgent", "Neutral"));

    pipeline(&stub, config()).triage("help").await.unwrap();

    assert!(logs_contain("classification failed"));
    assert!(logs_contain("classification_failed"));
}
