//! Triage configuration.
//!
//! Everything the pipeline needs (model, credentials, endpoint, timeouts,
//! retry policy, failure policy) lives in [`TriageConfig`] and is passed in
//! explicitly. Nothing here reads the process environment.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// What to do when a classification step cannot produce a valid label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop in `ClassificationFailed` and report the raw error.
    #[default]
    Surface,
    /// Continue with the lowest-risk label (`General` / `Neutral`).
    Fallback,
}

/// How handlers produce the response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Ask the model for a route-specific answer.
    #[default]
    Llm,
    /// Use canned per-route text.
    Template,
}

/// Top-level triage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub model: ModelConfig,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
    pub responses: ResponseMode,
    /// Upper bound on tickets processed at once by `triage_batch`.
    pub max_concurrency: usize,
    /// Deadline for one whole ticket, on top of the per-call timeouts.
    pub flow_timeout_ms: Option<u64>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            retry: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
            responses: ResponseMode::default(),
            max_concurrency: 4,
            flow_timeout_ms: None,
        }
    }
}

impl TriageConfig {
    /// Defaults around `model`.
    pub fn new(model: ModelConfig) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Set the retry policy for classifier calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_responses(mut self, mode: ResponseMode) -> Self {
        self.responses = mode;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Bound the whole run.
    pub fn with_flow_timeout(mut self, timeout: Duration) -> Self {
        self.flow_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Whole-run deadline, if any.
    pub fn flow_timeout(&self) -> Option<Duration> {
        self.flow_timeout_ms.map(Duration::from_millis)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.model.model_name.trim().is_empty() {
            return Err(TriageError::configuration("model.model_name must not be empty"));
        }
        let temperature = self.model.parameters.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(TriageError::configuration(format!(
                "model.parameters.temperature must be within 0..=2, got {temperature}"
            )));
        }
        if self.model.api.timeout_ms == 0 {
            return Err(TriageError::configuration("model.api.timeout_ms must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(TriageError::configuration("retry.max_attempts must be at least 1"));
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(TriageError::configuration(
                "retry.max_backoff_ms must not be below retry.initial_backoff_ms",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(TriageError::configuration("max_concurrency must be at least 1"));
        }
        if self.flow_timeout_ms == Some(0) {
            return Err(TriageError::configuration("flow_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Hosted model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name; the provider is inferred from it (`gpt-*`, `claude-*`, ...).
    pub model_name: String,
    pub parameters: ModelParameters,
    pub api: ApiConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o-mini".to_string(),
            parameters: ModelParameters::default(),
            api: ApiConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Default parameters and API settings for `model_name`.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_api_config(mut self, api: ApiConfig) -> Self {
        self.api = api;
        self
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(512),
        }
    }
}

impl ModelParameters {
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Credentials, endpoint and per-call timeout.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    /// Override for OpenAI-compatible endpoints.
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first.
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `max_attempts` tries, backing off exponentially from `initial_backoff`.
    pub fn new(max_attempts: usize, initial_backoff: Duration) -> Self {
        let initial_backoff_ms = initial_backoff.as_millis() as u64;
        Self {
            max_attempts,
            initial_backoff_ms,
            max_backoff_ms: initial_backoff_ms.max(Self::default().max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (0-based), with 0.8x-1.2x jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(retry))
            .min(self.max_backoff_ms);
        let jitter = 0.8 + fastrand::f64() * 0.4;
        Duration::from_millis((base as f64 * jitter) as u64)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TriageConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.failure_policy, FailurePolicy::Surface);
        assert_eq!(config.responses, ResponseMode::Llm);
        assert_eq!(config.model.model_name, "gpt-4o-mini");
        assert_eq!(config.model.api.timeout(), Duration::from_secs(30));
        config.validate().unwrap();
    }

    #[test]
    fn loads_partial_yaml() {
        let yaml = r#"
model:
  model_name: gpt-4o
  api:
    api_key: sk-test
    timeout_ms: 5000
retry:
  max_attempts: 5
failure_policy: fallback
responses: template
"#;
        let config = TriageConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.api.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model.api.timeout_ms, 5000);
        assert_eq!(config.model.parameters.temperature, 0.0);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
        assert_eq!(config.failure_policy, FailurePolicy::Fallback);
        assert_eq!(config.responses, ResponseMode::Template);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.flow_timeout(), None);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = TriageConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "retry: { max_attempts: 0 }",
            "max_concurrency: 0",
            "model: { model_name: '' }",
            "model: { api: { timeout_ms: 0 } }",
            "model: { parameters: { temperature: 3.5 } }",
            "retry: { initial_backoff_ms: 500, max_backoff_ms: 100 }",
            "flow_timeout_ms: 0",
        ];
        for yaml in cases {
            let err = TriageConfig::from_yaml_str(yaml).unwrap_err();
            assert!(
                matches!(err, TriageError::Configuration(_)),
                "{yaml}: {err}"
            );
        }
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = TriageConfig::from_yaml_str("failure_policy: sometimes").unwrap_err();
        assert!(matches!(err, TriageError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = TriageConfig::from_yaml_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, TriageError::Io(_)));
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let retry = RetryPolicy {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };

        let first = retry.backoff(0).as_millis();
        assert!((80..=120).contains(&first), "{first}");

        let third = retry.backoff(2).as_millis();
        assert!((320..=480).contains(&third), "{third}");

        let capped = retry.backoff(20).as_millis();
        assert!(capped <= 1_200, "{capped}");
    }

    #[test]
    fn api_key_is_not_logged() {
        let api = ApiConfig::default().with_api_key("sk-secret");
        let rendered = format!("{api:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
