//! The composition engine: skeleton selection, slot ordering, and
//! template rendering under entropy control.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use thiserror::Error;

use crate::entropy::{DelimiterKind, EntropyEngine, NoiseCharset};

use super::pool::ContentPoolProvider;
use super::skeleton::{Skeleton, Slot, SlotPosition};

/// Errors from composition. These are configuration/programming errors
/// and propagate; they are never silently tolerated.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// A required slot has no supplied content.
    #[error("required slot '{slot}' of skeleton '{skeleton}' has no content")]
    MissingSlot { skeleton: String, slot: String },

    /// The template references a placeholder that is neither a slot nor a
    /// known format token.
    #[error("unknown placeholder '{{{placeholder}}}' in skeleton '{skeleton}'")]
    UnknownPlaceholder { skeleton: String, placeholder: String },

    /// No skeletons are registered.
    #[error("no skeletons registered")]
    EmptyRegistry,
}

/// Weights for skeleton selection scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Weight of the mode affinity term.
    pub mode_weight: f64,
    /// Weight of the target affinity term.
    pub target_weight: f64,
    /// Constant baseline added to every score.
    pub baseline: f64,
    /// Half-width of the uniform jitter, scaled by each skeleton's
    /// entropy tolerance.
    pub jitter: f64,
    /// Temperature for the weighted sampling over scores.
    pub selection_temperature: f64,
    /// Affinity assumed when a skeleton has no entry for a mode/target.
    pub default_affinity: f64,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            mode_weight: 0.5,
            target_weight: 0.4,
            baseline: 0.1,
            jitter: 0.1,
            selection_temperature: 1.2,
            default_affinity: 0.5,
        }
    }
}

/// A materialized text output, immutable once created, carrying its
/// provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Content-derived identifier (12 hex chars).
    pub id: String,
    /// Skeleton the variant was rendered from.
    pub skeleton_id: String,
    /// The rendered text.
    pub text: String,
    /// Slot name → content actually substituted.
    pub fill: BTreeMap<String, String>,
    /// Signature of the entropy run that produced it.
    pub entropy_signature: String,
    /// 0 for a fresh render; incremented by duel refinement.
    pub refinement_round: u32,
    pub created_at: DateTime<Utc>,
}

impl Variant {
    fn new(
        skeleton_id: &str,
        text: String,
        fill: BTreeMap<String, String>,
        entropy_signature: String,
    ) -> Self {
        let id = content_id(skeleton_id, &text);
        Self {
            id,
            skeleton_id: skeleton_id.to_string(),
            text,
            fill,
            entropy_signature,
            refinement_round: 0,
            created_at: Utc::now(),
        }
    }

    /// Successor variant produced by refining this one. Provenance is
    /// carried over; only the text and round change.
    pub fn refined(&self, text: impl Into<String>, round: u32) -> Self {
        let text = text.into();
        Self {
            id: content_id(&self.skeleton_id, &text),
            skeleton_id: self.skeleton_id.clone(),
            text,
            fill: self.fill.clone(),
            entropy_signature: self.entropy_signature.clone(),
            refinement_round: round,
            created_at: Utc::now(),
        }
    }
}

fn content_id(skeleton_id: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(skeleton_id.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())[..12].to_string()
}

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-z][a-z0-9_]*(?::[a-z][a-z0-9_]*)?)\}").unwrap()
});

/// Assembles variants from skeletons and supplied content.
pub struct CompositionEngine {
    skeletons: Vec<Skeleton>,
    config: CompositionConfig,
}

impl CompositionEngine {
    pub fn new(config: CompositionConfig) -> Self {
        Self {
            skeletons: Vec::new(),
            config,
        }
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeletons.push(skeleton);
        self
    }

    pub fn register(&mut self, skeleton: Skeleton) {
        self.skeletons.push(skeleton);
    }

    pub fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    /// Select a skeleton for the given mode and target.
    ///
    /// Every registered skeleton is scored as
    /// `mode_affinity * w1 + target_affinity * w2 + baseline` plus
    /// entropy-scaled jitter bounded by the skeleton's own tolerance, and
    /// the winner is drawn by weighted sampling over the scores. Sampling
    /// (rather than argmax) keeps a dominant skeleton from recurring on
    /// every run with identical inputs.
    pub fn select_skeleton<'a>(
        &'a self,
        entropy: &mut EntropyEngine,
        mode: &str,
        target: &str,
    ) -> Result<&'a Skeleton, CompositionError> {
        if self.skeletons.is_empty() {
            return Err(CompositionError::EmptyRegistry);
        }

        let cfg = &self.config;
        let scores: Vec<f64> = self
            .skeletons
            .iter()
            .map(|skeleton| {
                let mode_affinity = skeleton
                    .mode_affinity
                    .get(mode)
                    .copied()
                    .unwrap_or(cfg.default_affinity);
                let target_affinity = skeleton
                    .target_affinity
                    .get(target)
                    .copied()
                    .unwrap_or(cfg.default_affinity);
                let jitter =
                    entropy.range_value(-cfg.jitter, cfg.jitter) * skeleton.entropy_tolerance;

                (mode_affinity * cfg.mode_weight
                    + target_affinity * cfg.target_weight
                    + cfg.baseline
                    + jitter)
                    .max(0.0)
            })
            .collect();

        entropy
            .weighted_choice(&self.skeletons, &scores, cfg.selection_temperature)
            .ok_or(CompositionError::EmptyRegistry)
    }

    /// Order slots for assembly: group by position hint, then partial-
    /// shuffle within each group. Early slots shuffle least and late
    /// slots most, so the opening stays coherent while fine detail
    /// varies. The effective intensity is bounded by the skeleton's
    /// entropy tolerance.
    pub fn order_slots(
        &self,
        entropy: &mut EntropyEngine,
        skeleton: &Skeleton,
        shuffle_intensity: f64,
    ) -> Vec<Slot> {
        let intensity = shuffle_intensity.min(skeleton.entropy_tolerance);

        let group = |position: SlotPosition| -> Vec<Slot> {
            skeleton
                .slots
                .iter()
                .filter(|s| s.position == position)
                .cloned()
                .collect()
        };

        let mut early = group(SlotPosition::Early);
        let mut middle = group(SlotPosition::Middle);
        let mut late = group(SlotPosition::Late);

        if intensity > 0.4 {
            early = entropy.partial_shuffle(&early, intensity * 0.4);
        }
        if intensity > 0.3 {
            middle = entropy.partial_shuffle(&middle, intensity * 0.7);
        }
        if intensity > 0.2 {
            late = entropy.partial_shuffle(&late, intensity);
        }

        early.into_iter().chain(middle).chain(late).collect()
    }

    /// Render a skeleton's template with the supplied slot content.
    ///
    /// Format placeholders (`{delim}`, `{subdelim}`, `{bullet}`,
    /// `{bracket_open}`/`{bracket_close}` as a matched pair, and
    /// `{tag_open:name}`/`{tag_close:name}` nonce tags unique within this
    /// render) are substituted with entropy-chosen values. Unfilled
    /// non-required slots collapse to empty; an unfilled required slot is
    /// an error. Runs of blank lines are collapsed and the result is
    /// trimmed.
    pub fn render(
        &self,
        entropy: &mut EntropyEngine,
        skeleton: &Skeleton,
        content: &HashMap<String, String>,
    ) -> Result<Variant, CompositionError> {
        let mut template = skeleton.template.clone();

        // Validate every placeholder up front and collect nonce tag names
        // in order of appearance.
        let mut tag_names: Vec<String> = Vec::new();
        for capture in PLACEHOLDER_RE.captures_iter(&skeleton.template) {
            let token = &capture[1];
            match token {
                "delim" | "subdelim" | "bullet" | "bracket_open" | "bracket_close" => {}
                _ if token.starts_with("tag_open:") || token.starts_with("tag_close:") => {
                    let name = token.split(':').nth(1).unwrap_or_default().to_string();
                    if !tag_names.contains(&name) {
                        tag_names.push(name);
                    }
                }
                _ if skeleton.slot(token).is_some() => {}
                _ => {
                    return Err(CompositionError::UnknownPlaceholder {
                        skeleton: skeleton.id.clone(),
                        placeholder: token.to_string(),
                    });
                }
            }
        }

        // One draw per format token per render; repeated occurrences
        // share the value so open/close pairs stay matched.
        if template.contains("{delim}") {
            let delim = entropy.delimiter(DelimiterKind::Section);
            template = template.replace("{delim}", delim);
        }
        if template.contains("{subdelim}") {
            let delim = entropy.delimiter(DelimiterKind::Subsection);
            template = template.replace("{subdelim}", delim);
        }
        if template.contains("{bullet}") {
            let bullet = entropy.bullet();
            template = template.replace("{bullet}", bullet);
        }
        if template.contains("{bracket_open}") || template.contains("{bracket_close}") {
            let (open, close) = entropy.bracket_pair();
            template = template.replace("{bracket_open}", open);
            template = template.replace("{bracket_close}", close);
        }
        for name in &tag_names {
            let nonce = entropy.noise(6, NoiseCharset::Alpha).to_uppercase();
            template = template.replace(
                &format!("{{tag_open:{}}}", name),
                &format!("<{}>", nonce),
            );
            template = template.replace(
                &format!("{{tag_close:{}}}", name),
                &format!("</{}>", nonce),
            );
        }

        // Fill slots.
        let mut fill = BTreeMap::new();
        for slot in &skeleton.slots {
            let placeholder = format!("{{{}}}", slot.name);
            let supplied = content.get(&slot.name).map(|c| c.trim()).unwrap_or_default();

            if supplied.is_empty() {
                if slot.required {
                    return Err(CompositionError::MissingSlot {
                        skeleton: skeleton.id.clone(),
                        slot: slot.name.clone(),
                    });
                }
                template = template.replace(&placeholder, "");
            } else {
                template = template.replace(&placeholder, supplied);
                fill.insert(slot.name.clone(), supplied.to_string());
            }
        }

        // Normalize: collapse runs of blank lines, trim.
        while template.contains("\n\n\n") {
            template = template.replace("\n\n\n", "\n\n");
        }
        let text = template.trim().to_string();

        Ok(Variant::new(&skeleton.id, text, fill, entropy.signature()))
    }

    /// Full composition pass: select a skeleton, order its slots, pull
    /// content for each from the pools (weighted by fragment weight), and
    /// render. A required slot whose category has no pool or no fragments
    /// is a configuration error.
    pub fn compose(
        &self,
        entropy: &mut EntropyEngine,
        mode: &str,
        target: &str,
        pools: &dyn ContentPoolProvider,
    ) -> Result<Variant, CompositionError> {
        let skeleton = self.select_skeleton(entropy, mode, target)?;
        let ordered = self.order_slots(entropy, skeleton, entropy.level().intensity());

        let mut content = HashMap::new();
        for slot in &ordered {
            let fragment = pools.pool(&slot.category, Some(target)).and_then(|pool| {
                entropy
                    .weighted_choice(pool.fragments(), &pool.weights(), 1.0)
                    .cloned()
            });

            match fragment {
                Some(fragment) => {
                    content.insert(slot.name.clone(), fragment.text);
                }
                None if slot.required => {
                    return Err(CompositionError::MissingSlot {
                        skeleton: skeleton.id.clone(),
                        slot: slot.name.clone(),
                    });
                }
                None => {}
            }
        }

        self.render(entropy, skeleton, &content)
    }
}
