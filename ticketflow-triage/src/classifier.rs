//! The classifier boundary.
//!
//! A [`Classifier`] is an opaque oracle: it gets the query and a taxonomy and
//! answers with free text. Nothing it says is trusted. [`normalize_label`]
//! maps the answer onto the closed label enum or rejects it, and
//! [`ClassifierCall`] adds the per-call timeout and bounded retries.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, LazyLock, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::{
    config::RetryPolicy,
    error::ClassifierError,
    llm::ChatModel,
    prompts,
    ticket::{Category, ClassificationStep, Label, Sentiment, Taxonomy},
};

/// Maps text to one label of a taxonomy.
#[async_trait]
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Return the oracle's raw answer for `text`.
    async fn classify(&self, text: &str, taxonomy: &Taxonomy) -> Result<String, ClassifierError>;
}

/// Words that turn a label mention into a denial ("not negative").
const NEGATORS: &str = r"not|no|never|isn't|isnt|non|neither|nor";

static CATEGORY_MENTIONS: LazyLock<Regex> = LazyLock::new(|| mention_pattern(Category::LABELS));
static SENTIMENT_MENTIONS: LazyLock<Regex> = LazyLock::new(|| mention_pattern(Sentiment::LABELS));

// Matches a whole-word label, capturing a negator up to two words before it.
fn mention_pattern(labels: &[&str]) -> Regex {
    let alternatives: Vec<String> = labels.iter().map(|label| regex::escape(label)).collect();
    Regex::new(&format!(
        r"(?i)\b(?:(?P<negated>{NEGATORS})\W+(?:\w+\W+){{0,2}})?(?P<label>{})\b",
        alternatives.join("|")
    ))
    .expect("label mention pattern is built from escaped literals")
}

fn mentions_of(step: ClassificationStep) -> &'static Regex {
    match step {
        ClassificationStep::Category => LazyLock::force(&CATEGORY_MENTIONS),
        ClassificationStep::Sentiment => LazyLock::force(&SENTIMENT_MENTIONS),
    }
}

/// Map a raw oracle answer onto a label.
///
/// Accepts the canonical spelling in any case, with surrounding quotes or
/// punctuation. Otherwise accepts an answer that mentions exactly one label
/// as a whole word ("The category is Billing."). A negated mention ("not
/// negative") makes the whole answer unusable. Anything else is out of
/// taxonomy.
pub fn normalize_label<L: Label>(raw: &str) -> Result<L, ClassifierError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassifierError::EmptyResponse);
    }

    let bare = trimmed.trim_matches(|c: char| !c.is_alphanumeric());
    if let Some(label) = L::from_canonical(bare) {
        return Ok(label);
    }

    let out_of_taxonomy = || ClassifierError::OutOfTaxonomy {
        step: L::STEP,
        raw: trimmed.to_string(),
    };

    let mut mentioned: Vec<L> = Vec::new();
    for caps in mentions_of(L::STEP).captures_iter(trimmed) {
        if caps.name("negated").is_some() {
            return Err(out_of_taxonomy());
        }
        if let Some(label) = caps.name("label").and_then(|m| L::from_canonical(m.as_str()))
            && !mentioned.contains(&label)
        {
            mentioned.push(label);
        }
    }

    match mentioned.as_slice() {
        [only] => Ok(*only),
        _ => Err(out_of_taxonomy()),
    }
}

/// A classifier plus the timeout and retry policy applied to every call.
#[derive(Debug, Clone)]
pub struct ClassifierCall {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClassifierCall {
    /// Wrap `classifier` with a per-attempt timeout and retry policy.
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            classifier,
            timeout,
            retry,
        }
    }

    /// Classify `text` into `L`.
    ///
    /// Timeouts and transport errors are retried up to the policy's attempt
    /// budget. A well-formed answer that is not a label is returned as an
    /// error straight away.
    pub async fn run<L: Label>(&self, text: &str) -> Result<L, ClassifierError> {
        let taxonomy = Taxonomy::of::<L>();
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let answer = match tokio::time::timeout(
                self.timeout,
                self.classifier.classify(text, &taxonomy),
            )
            .await
            {
                Ok(answer) => answer,
                Err(_) => Err(ClassifierError::Timeout(self.timeout)),
            };

            match answer {
                Ok(raw) => {
                    debug!(step = %L::STEP, raw = %raw, attempt, "classifier answered");
                    return normalize_label::<L>(&raw);
                }
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.retry.backoff((attempt - 1) as u32);
                    warn!(
                        step = %L::STEP,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "classifier call failed, retrying"
                    );
                    #[cfg(feature = "metrics")]
                    metrics::counter!("ticketflow_classifier_retries_total", "step" => L::STEP.as_str())
                        .increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Classifier backed by a hosted chat model.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    model: Arc<ChatModel>,
}

impl LlmClassifier {
    /// Classify with the hosted model.
    pub fn new(model: Arc<ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &str, taxonomy: &Taxonomy) -> Result<String, ClassifierError> {
        let system = prompts::classification_system(taxonomy);
        let request = prompts::classification_request(taxonomy, text);
        self.model.complete(&system, &request).await
    }
}

/// One scripted answer of a [`StubClassifier`].
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Answer with this text.
    Answer(String),
    /// Fail with this error.
    Fail(ClassifierError),
    /// Never answer.
    Hang,
}

impl StubReply {
    /// Reply with `text`.
    pub fn answer(text: impl Into<String>) -> Self {
        Self::Answer(text.into())
    }
}

#[derive(Debug, Default)]
struct StubScript {
    replies: HashMap<ClassificationStep, VecDeque<StubReply>>,
    calls: HashMap<ClassificationStep, usize>,
}

/// Classifier with scripted replies per step, for tests and offline runs.
///
/// Replies for a step are consumed in order; the last one repeats forever.
#[derive(Debug, Default)]
pub struct StubClassifier {
    script: Mutex<StubScript>,
}

impl StubClassifier {
    /// A stub with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with these two labels.
    pub fn with_labels(category: &str, sentiment: &str) -> Self {
        Self::new()
            .reply(ClassificationStep::Category, StubReply::answer(category))
            .reply(ClassificationStep::Sentiment, StubReply::answer(sentiment))
    }

    /// Queue a reply for a step.
    pub fn reply(self, step: ClassificationStep, reply: StubReply) -> Self {
        self.lock().replies.entry(step).or_default().push_back(reply);
        self
    }

    /// Calls received for a step so far.
    pub fn calls(&self, step: ClassificationStep) -> usize {
        self.lock().calls.get(&step).copied().unwrap_or(0)
    }

    /// Calls across both steps.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubScript> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self, step: ClassificationStep) -> Option<StubReply> {
        let mut script = self.lock();
        *script.calls.entry(step).or_default() += 1;
        let queue = script.replies.get_mut(&step)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _text: &str, taxonomy: &Taxonomy) -> Result<String, ClassifierError> {
        match self.next_reply(taxonomy.step) {
            Some(StubReply::Answer(text)) => Ok(text),
            Some(StubReply::Fail(err)) => Err(err),
            Some(StubReply::Hang) => std::future::pending().await,
            None => Err(ClassifierError::model(format!(
                "no stub reply scripted for {}",
                taxonomy.step
            ))),
        }
    }
}
