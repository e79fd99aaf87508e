//! Refinement oracles: rewrite a variant using a judge's rationale.
//!
//! The injected [`RefinementOracle`] may fail or return degenerate
//! output; [`MutationRefiner`] is the concrete, always-valid default that
//! deterministically mutates the variant's structure instead, so the
//! duel loop never stalls on refinement.

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::LazyLock;
use thiserror::Error;

use crate::compose::Variant;
use crate::entropy::{DelimiterKind, EntropyEngine, EntropyLevel};

use super::client::{query_with_retry, JudgeClient, JudgeError, JudgeRequest, RetryPolicy};

/// Errors from refinement.
#[derive(Debug, Error)]
pub enum RefinementError {
    #[error("judge error: {0}")]
    Judge(#[from] JudgeError),

    #[error("degenerate refinement: {0}")]
    Degenerate(String),
}

/// Produces an improved variant text from the current text and the
/// strict judge's rationale.
#[async_trait]
pub trait RefinementOracle: Send + Sync {
    async fn refine(&self, variant: &Variant, rationale: &str) -> Result<String, RefinementError>;
}

const REFINE_SYSTEM_PROMPT: &str =
    "You rewrite text to address reviewer feedback. Respond with the rewritten text only — \
     no preamble, no commentary, no code fences.";

/// Refinement backed by an external judge-style client.
pub struct JudgeRefiner {
    client: Arc<dyn JudgeClient>,
    retry: RetryPolicy,
    min_len: usize,
}

impl JudgeRefiner {
    pub fn new(client: Arc<dyn JudgeClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            min_len: 20,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }
}

#[async_trait]
impl RefinementOracle for JudgeRefiner {
    async fn refine(&self, variant: &Variant, rationale: &str) -> Result<String, RefinementError> {
        let prompt = format!(
            "Rewrite the following text to address this feedback.\n\nFEEDBACK:\n{}\n\nTEXT:\n---\n{}\n---",
            rationale, variant.text
        );
        let request = JudgeRequest::new(prompt).with_system_prompt(REFINE_SYSTEM_PROMPT);

        let raw = query_with_retry(self.client.as_ref(), &request, &self.retry).await?;
        let cleaned = cleanup_suggestion(&raw);

        if cleaned.trim().len() < self.min_len {
            return Err(RefinementError::Degenerate(format!(
                "result too short ({} chars)",
                cleaned.trim().len()
            )));
        }
        Ok(cleaned)
    }
}

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[a-z]*\n?(.*?)```").unwrap());

static LEAD_IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^(?:here is|here's)?\s*(?:the|a|an)?\s*(?:refactored|improved|enhanced|rewritten|better|stronger|updated|final)\s+(?:version|text|prompt|draft)\s*[:\-]*\s*",
    )
    .unwrap()
});

/// Normalize a model's rewrite reply into usable text: unwrap code
/// fences, drop stray triple-quote runs, strip "improved version:"-style
/// lead-ins. A reply that cleans down to nothing falls back to the raw
/// trimmed input.
pub fn cleanup_suggestion(raw: &str) -> String {
    // Unwrap fenced blocks rather than deleting them — models often put
    // the whole rewrite inside one.
    let unfenced = CODE_FENCE_RE.replace_all(raw, "$1");
    let unquoted = unfenced.replace("\"\"\"", "").replace("'''", "");
    let cleaned = LEAD_IN_RE.replace_all(&unquoted, "").trim().to_string();

    if cleaned.len() < 5 {
        raw.trim().to_string()
    } else {
        cleaned
    }
}

/// Deterministic structural mutation of variant text.
///
/// Seeded from a hash of the text (plus an optional salt), so the same
/// input always mutates the same way: paragraph blocks are partially
/// shuffled, delimiter rules are redrawn, and if nothing moved the
/// blocks are rotated. Always valid, never fails.
#[derive(Debug, Clone)]
pub struct MutationRefiner {
    level: EntropyLevel,
}

impl Default for MutationRefiner {
    fn default() -> Self {
        Self {
            level: EntropyLevel::Minimal,
        }
    }
}

impl MutationRefiner {
    pub fn new(level: EntropyLevel) -> Self {
        Self { level }
    }

    /// Mutate text deterministically.
    pub fn mutate_text(&self, text: &str) -> String {
        self.mutate_with_salt(text, 0)
    }

    /// Mutate text deterministically under a salt, for generating
    /// distinct siblings of the same text.
    pub fn mutate_with_salt(&self, text: &str, salt: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(salt.to_be_bytes());
        let digest = hasher.finalize();
        let mut seed_bytes = [0u8; 8];
        seed_bytes.copy_from_slice(&digest[..8]);
        let seed = u64::from_be_bytes(seed_bytes);

        let mut entropy = EntropyEngine::new(Some(seed), self.level);

        let blocks: Vec<String> = text.split("\n\n").map(|b| b.to_string()).collect();
        let mut mutated = entropy.partial_shuffle(&blocks, self.level.intensity() * 0.5);

        // Redraw delimiter rules so repeated fallbacks still vary shape.
        for block in &mut mutated {
            if is_delimiter_line(block) {
                *block = entropy.delimiter(DelimiterKind::Section).to_string();
            }
        }

        if mutated == blocks && blocks.len() > 1 {
            mutated.rotate_left(1);
        }

        mutated.join("\n\n")
    }
}

fn is_delimiter_line(block: &str) -> bool {
    let trimmed = block.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| !c.is_alphanumeric())
}

#[async_trait]
impl RefinementOracle for MutationRefiner {
    async fn refine(&self, variant: &Variant, _rationale: &str) -> Result<String, RefinementError> {
        debug!("mutation refiner active for variant {}", variant.id);
        Ok(self.mutate_text(&variant.text))
    }
}
