//! Judge client trait, retry policy, and the scoring wrapper.
//!
//! A [`JudgeClient`] is the narrow interface to an external scoring
//! oracle. Failures come in transient kinds (retried with backoff) and
//! permanent kinds (surfaced immediately); once the retry budget is
//! exhausted both degrade to a fallback verdict so the surrounding loop
//! always makes progress.

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_verdict, ScoreScale, Verdict};

/// Errors from judge queries.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("judge timed out after {0:?}")]
    Timeout(Duration),
}

impl JudgeError {
    /// Transient failures are worth retrying; permanent ones are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            JudgeError::RateLimited { .. } => true,
            JudgeError::Api { status, .. } => *status >= 500,
            JudgeError::Network(_) => true,
            JudgeError::Timeout(_) => true,
            JudgeError::InvalidResponse(_) => false,
            JudgeError::MissingApiKey { .. } => false,
        }
    }
}

/// Everything needed for one judge call.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    /// The text to evaluate.
    pub text: String,
    /// Optional system prompt override.
    pub system_prompt: Option<String>,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
    /// Optional response token cap.
    pub max_tokens: Option<u32>,
}

impl JudgeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Stateless judge client — each call is independent.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Submit text for evaluation and return the raw response.
    async fn query(&self, request: JudgeRequest) -> Result<String, JudgeError>;

    /// The model this client queries.
    fn model(&self) -> &str;
}

/// Bounded retry with exponential backoff and a per-call timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub call_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            call_timeout_secs: 60,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Query a judge under the retry policy.
///
/// Retries transient failures with exponential backoff (honoring
/// rate-limit hints), never retries permanent ones, and wraps every
/// attempt in the policy's timeout.
pub async fn query_with_retry(
    client: &dyn JudgeClient,
    request: &JudgeRequest,
    policy: &RetryPolicy,
) -> Result<String, JudgeError> {
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay();

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(policy.call_timeout(), client.query(request.clone()))
            .await
            .map_err(|_| JudgeError::Timeout(policy.call_timeout()))
            .and_then(|r| r);

        match outcome {
            Ok(text) => return Ok(text),
            Err(err) if err.is_retryable() && attempt < attempts => {
                let wait = match &err {
                    JudgeError::RateLimited { retry_after } => {
                        (*retry_after).min(policy.max_delay())
                    }
                    _ => delay,
                };
                warn!(
                    "judge '{}' attempt {}/{} failed ({}), retrying in {:?}",
                    client.model(),
                    attempt,
                    attempts,
                    err,
                    wait
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(policy.max_delay());
            }
            Err(err) => return Err(err),
        }
    }

    Err(JudgeError::Timeout(policy.call_timeout()))
}

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an evaluation model. You do not generate content; you only score it. \
     Respond ONLY with a JSON object of the form \
     {\"score\": <number>, \"justification\": \"<brief explanation>\", \
     \"suggestion\": \"<how to improve it>\"}.";

/// A judge bundled with its prompt, scale, and retry policy.
///
/// `score` never fails: parse degradation and judge unavailability both
/// collapse into the defined fallback verdict.
pub struct ScoringJudge {
    client: Arc<dyn JudgeClient>,
    system_prompt: String,
    scale: ScoreScale,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl ScoringJudge {
    pub fn new(client: Arc<dyn JudgeClient>) -> Self {
        Self {
            client,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            scale: ScoreScale::default(),
            retry: RetryPolicy::default(),
            max_tokens: 500,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn scale(&self) -> ScoreScale {
        self.scale
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Build the evaluation prompt for a piece of text.
    fn rating_prompt(&self, text: &str) -> String {
        format!(
            "Evaluate the following text on a scale of {} to {}.\n\nTEXT:\n---\n{}\n---",
            self.scale.min, self.scale.max, text
        )
    }

    /// Score text. Always yields a verdict; retry exhaustion and
    /// permanent failures produce the fallback verdict.
    pub async fn score(&self, text: &str) -> Verdict {
        let request = JudgeRequest::new(self.rating_prompt(text))
            .with_system_prompt(self.system_prompt.clone())
            .with_max_tokens(self.max_tokens);

        match query_with_retry(self.client.as_ref(), &request, &self.retry).await {
            Ok(raw) => parse_verdict(&raw, self.scale),
            Err(err) => {
                warn!(
                    "judge '{}' unavailable, substituting fallback verdict: {}",
                    self.client.model(),
                    err
                );
                Verdict::fallback(&format!("judge unavailable: {}", err), "")
            }
        }
    }
}
