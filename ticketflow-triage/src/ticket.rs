//! Ticket model and the closed label sets used to classify it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TriageError};

/// Which classification a label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStep {
    Category,
    Sentiment,
}

impl ClassificationStep {
    /// Lowercase name used in logs and serialized reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for ClassificationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed label set offered to the classifier for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taxonomy {
    pub step: ClassificationStep,
    pub labels: &'static [&'static str],
}

impl Taxonomy {
    /// Taxonomy of a label type.
    pub fn of<L: Label>() -> Self {
        Self {
            step: L::STEP,
            labels: L::LABELS,
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// A closed set of labels a classifier may answer with.
pub trait Label:
    Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Step this label set is used for.
    const STEP: ClassificationStep;

    /// Every label, in the order the taxonomy presents them.
    const ALL: &'static [Self];

    /// Canonical spelling of every label, parallel to `ALL`.
    const LABELS: &'static [&'static str];

    /// Label assumed when classification fails and the fallback policy is on.
    const LOWEST_RISK: Self;

    /// Canonical spelling.
    fn as_str(self) -> &'static str;

    /// Exact, case-insensitive lookup of a canonical label.
    fn from_canonical(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Support area a ticket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Technical,
    Billing,
    General,
}

impl Label for Category {
    const STEP: ClassificationStep = ClassificationStep::Category;
    const ALL: &'static [Self] = &[Self::Technical, Self::Billing, Self::General];
    const LABELS: &'static [&'static str] = &["Technical", "Billing", "General"];
    const LOWEST_RISK: Self = Self::General;

    fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "Technical",
            Self::Billing => "Billing",
            Self::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer sentiment expressed in a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Label for Sentiment {
    const STEP: ClassificationStep = ClassificationStep::Sentiment;
    const ALL: &'static [Self] = &[Self::Positive, Self::Neutral, Self::Negative];
    const LABELS: &'static [&'static str] = &["Positive", "Neutral", "Negative"];
    const LOWEST_RISK: Self = Self::Neutral;

    fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a classification step did not produce a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: ClassificationStep,
    pub error: String,
}

/// One customer query moving through triage.
///
/// `category`, `sentiment` and `response` are write-once. Once the ticket is
/// closed (a response was written or classification failed) it rejects every
/// further mutation.
///
/// Tickets are only built through [`Ticket::new`]; they serialize for
/// reporting but never deserialize.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    id: Uuid,
    received_at: DateTime<Utc>,
    query: String,
    category: Option<Category>,
    sentiment: Option<Sentiment>,
    response: Option<String>,
    failure: Option<StepFailure>,
    fallbacks: Vec<ClassificationStep>,
}

impl Ticket {
    /// Accept a query. Empty or whitespace-only text is rejected.
    pub fn new(query: impl Into<String>) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(TriageError::invalid_input("query must not be empty"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            query,
            category: None,
            sentiment: None,
            response: None,
            failure: None,
            fallbacks: Vec::new(),
        })
    }

    /// Id assigned on arrival.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the query arrived.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The query text, unchanged.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Category, once classified.
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Sentiment, once classified.
    pub fn sentiment(&self) -> Option<Sentiment> {
        self.sentiment
    }

    /// Response written by the handler that closed the ticket.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Why classification failed, if it did.
    pub fn failure(&self) -> Option<&StepFailure> {
        self.failure.as_ref()
    }

    /// Steps whose label was defaulted instead of classified.
    pub fn fallbacks(&self) -> &[ClassificationStep] {
        &self.fallbacks
    }

    /// A closed ticket has a response or a failure and accepts no changes.
    pub fn is_closed(&self) -> bool {
        self.response.is_some() || self.failure.is_some()
    }

    /// Set the category. Fails if already set or closed.
    pub fn set_category(&mut self, category: Category) -> Result<()> {
        self.ensure_open()?;
        if self.category.is_some() {
            return Err(TriageError::AlreadySet("category"));
        }
        self.category = Some(category);
        Ok(())
    }

    /// Set the sentiment. Fails if already set or closed.
    pub fn set_sentiment(&mut self, sentiment: Sentiment) -> Result<()> {
        self.ensure_open()?;
        if self.sentiment.is_some() {
            return Err(TriageError::AlreadySet("sentiment"));
        }
        self.sentiment = Some(sentiment);
        Ok(())
    }

    /// Write the final response and close the ticket.
    pub fn set_response(&mut self, response: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.response = Some(response.into());
        Ok(())
    }

    /// Close the ticket as unclassifiable.
    pub fn record_failure(&mut self, step: ClassificationStep, error: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.failure = Some(StepFailure {
            step,
            error: error.into(),
        });
        Ok(())
    }

    pub(crate) fn mark_fallback(&mut self, step: ClassificationStep) {
        if !self.fallbacks.contains(&step) {
            self.fallbacks.push(step);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(TriageError::TicketClosed(self.id));
        }
        Ok(())
    }
}
