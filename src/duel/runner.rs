//! The multi-round duel controller.
//!
//! Two judges with asymmetric strictness take turns on a variant: the
//! strict judge scores the current text, its rationale drives a
//! refinement, and the lenient judge scores the result. Early exit on a
//! strong strict signal, deterministic mutation when refinement fails,
//! and a fixed round budget guarantee termination with a best-effort
//! outcome.

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::compose::Variant;
use crate::judge::{
    MutationRefiner, RefinementOracle, ScoreScale, ScoringJudge, Verdict,
};
use crate::metrics::{MetricEvent, MetricsSink, NullSink};

/// Rationale-based score reinterpretation.
///
/// Judges sometimes hedge in prose while giving a high number (or the
/// reverse); fixed shifts keyed on substring markers counter that. This
/// is a tunable heuristic, not a calibrated model — markers matching in
/// an unrelated sense will mis-fire, so both lists and both shifts are
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgePolicy {
    /// Markers that lower the score when present in the rationale.
    pub hedge_markers: Vec<String>,
    /// Markers that raise the score when present in the rationale.
    pub agreement_markers: Vec<String>,
    /// Points subtracted when any hedge marker matches.
    pub hedge_penalty: f64,
    /// Points added when any agreement marker matches.
    pub agreement_boost: f64,
}

impl Default for HedgePolicy {
    fn default() -> Self {
        Self {
            hedge_markers: ["partial", "somewhat", "however", "limited", "weak", "unclear"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            agreement_markers: ["strongly", "highly effective", "clearly", "exceptional"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hedge_penalty: 2.0,
            agreement_boost: 1.0,
        }
    }
}

impl HedgePolicy {
    /// Adjusted score for a verdict, clamped to the scale. Each marker
    /// list applies its shift at most once.
    pub fn adjust(&self, verdict: &Verdict, scale: ScoreScale) -> f64 {
        let rationale = verdict.rationale.to_lowercase();
        let mut score = verdict.score;

        if self.hedge_markers.iter().any(|m| rationale.contains(m)) {
            score -= self.hedge_penalty;
        }
        if self.agreement_markers.iter().any(|m| rationale.contains(m)) {
            score += self.agreement_boost;
        }

        scale.clamp(score)
    }
}

/// Duel parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuelConfig {
    /// Either judge's best reaching this ends the duel in success.
    pub threshold: f64,
    /// Adjusted strict score that triggers immediate early exit.
    pub strong_signal: f64,
    /// Round budget.
    pub max_rounds: u32,
    /// Refinements shorter than this are degenerate and fall back to
    /// mutation.
    pub min_refinement_len: usize,
    /// Mutated siblings scored per round in the mini-search; 0 disables
    /// it.
    pub sibling_search: usize,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            threshold: 7.0,
            strong_signal: 7.0,
            max_rounds: 8,
            min_refinement_len: 20,
            sibling_search: 0,
        }
    }
}

/// How a round resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundResolution {
    /// The strict judge's adjusted score cleared the strong-signal bar.
    EarlyExit,
    /// A best score cleared the threshold after refinement.
    Success,
    /// Neither threshold met; the duel continues.
    Continue,
    /// The round budget ran out on this round.
    Exhausted,
}

impl RoundResolution {
    fn as_str(self) -> &'static str {
        match self {
            RoundResolution::EarlyExit => "early_exit",
            RoundResolution::Success => "success",
            RoundResolution::Continue => "continue",
            RoundResolution::Exhausted => "exhausted",
        }
    }
}

/// Per-round record.
#[derive(Debug, Clone)]
pub struct DuelState {
    pub round: u32,
    pub variant_id: String,
    pub strict: Verdict,
    pub adjusted_strict: f64,
    /// Absent when the round early-exited before the lenient judge ran.
    pub lenient: Option<Verdict>,
    pub resolution: RoundResolution,
}

/// Terminal result of a duel. Always produced — never a pending state.
#[derive(Debug, Clone)]
pub struct DuelOutcome {
    /// The best variant seen across all rounds.
    pub variant: Variant,
    /// Rounds actually run (1..=max_rounds).
    pub rounds: u32,
    pub best_strict: f64,
    pub best_lenient: f64,
    /// Whether a success threshold was met.
    pub success: bool,
    pub states: Vec<DuelState>,
}

/// Orchestrates the strict judge, refinement, and the lenient judge
/// across rounds.
pub struct DuelLoop {
    strict: ScoringJudge,
    lenient: ScoringJudge,
    refiner: Arc<dyn RefinementOracle>,
    fallback: MutationRefiner,
    hedge: HedgePolicy,
    config: DuelConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl DuelLoop {
    /// Build a duel loop. The refinement oracle is injected; the
    /// mutation fallback is always present underneath it.
    pub fn new(
        strict: ScoringJudge,
        lenient: ScoringJudge,
        refiner: Arc<dyn RefinementOracle>,
        config: DuelConfig,
    ) -> Self {
        Self {
            strict,
            lenient,
            refiner,
            fallback: MutationRefiner::default(),
            hedge: HedgePolicy::default(),
            config,
            metrics: Arc::new(NullSink),
        }
    }

    pub fn with_hedge_policy(mut self, hedge: HedgePolicy) -> Self {
        self.hedge = hedge;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_fallback(mut self, fallback: MutationRefiner) -> Self {
        self.fallback = fallback;
        self
    }

    /// Run the duel to a terminal outcome. Judge and refinement failures
    /// are absorbed by fallbacks; the loop always terminates within the
    /// round budget.
    pub async fn run(&self, initial: Variant) -> DuelOutcome {
        let mut current = initial.clone();
        let mut best_variant = initial;
        let mut best_strict: f64 = 0.0;
        let mut best_lenient: f64 = 0.0;
        let mut states: Vec<DuelState> = Vec::new();

        let max_rounds = self.config.max_rounds.max(1);

        for round in 1..=max_rounds {
            // Strict judge first; its rationale feeds the refinement.
            let strict_verdict = self.strict.score(&current.text).await;
            let adjusted = self.hedge.adjust(&strict_verdict, self.strict.scale());
            debug!(
                "round {}: strict {} adjusted {}",
                round, strict_verdict.score, adjusted
            );

            if adjusted > best_strict {
                best_strict = adjusted;
                best_variant = current.clone();
            }

            if adjusted >= self.config.strong_signal {
                let state = DuelState {
                    round,
                    variant_id: current.id.clone(),
                    strict: strict_verdict,
                    adjusted_strict: adjusted,
                    lenient: None,
                    resolution: RoundResolution::EarlyExit,
                };
                self.record_round(&state);
                states.push(state);

                return DuelOutcome {
                    variant: current,
                    rounds: round,
                    best_strict,
                    best_lenient,
                    success: true,
                    states,
                };
            }

            // Refine, falling back to deterministic mutation on failure
            // or a degenerate result.
            let refined_text = match self.refiner.refine(&current, &strict_verdict.rationale).await
            {
                Ok(text) if text.trim().len() >= self.config.min_refinement_len => text,
                Ok(text) => {
                    warn!(
                        "refinement degenerate ({} chars), using mutation fallback",
                        text.trim().len()
                    );
                    self.fallback.mutate_text(&current.text)
                }
                Err(err) => {
                    warn!("refinement unavailable ({}), using mutation fallback", err);
                    self.fallback.mutate_text(&current.text)
                }
            };
            let mut refined = current.refined(refined_text, round);

            // Optional mini-search: mutated siblings compete on the
            // strict judge's raw score.
            if self.config.sibling_search > 0 {
                refined = self.sibling_search(refined, round).await;
            }

            // Lenient judge scores the refined variant.
            let lenient_verdict = self.lenient.score(&refined.text).await;
            if lenient_verdict.score > best_lenient {
                best_lenient = lenient_verdict.score;
                best_variant = refined.clone();
            }

            let success =
                best_strict >= self.config.threshold || best_lenient >= self.config.threshold;
            let resolution = if success {
                RoundResolution::Success
            } else if round == max_rounds {
                RoundResolution::Exhausted
            } else {
                RoundResolution::Continue
            };

            let state = DuelState {
                round,
                variant_id: refined.id.clone(),
                strict: strict_verdict,
                adjusted_strict: adjusted,
                lenient: Some(lenient_verdict),
                resolution,
            };
            self.record_round(&state);
            states.push(state);

            if success {
                return DuelOutcome {
                    variant: refined,
                    rounds: round,
                    best_strict,
                    best_lenient,
                    success: true,
                    states,
                };
            }

            current = refined;
        }

        DuelOutcome {
            variant: best_variant,
            rounds: max_rounds,
            best_strict,
            best_lenient,
            success: false,
            states,
        }
    }

    /// Score `sibling_search` mutated siblings with the strict judge and
    /// keep the best candidate (the refined variant competes too).
    async fn sibling_search(&self, refined: Variant, round: u32) -> Variant {
        let mut best = refined.clone();
        let mut best_score = self.strict.score(&refined.text).await.score;

        for salt in 1..=self.config.sibling_search as u64 {
            let text = self
                .fallback
                .mutate_with_salt(&refined.text, (round as u64) << 16 | salt);
            let sibling = refined.refined(text, round);
            let score = self.strict.score(&sibling.text).await.score;

            if score > best_score {
                best_score = score;
                best = sibling;
            }
        }

        best
    }

    fn record_round(&self, state: &DuelState) {
        self.metrics.record(MetricEvent::DuelRound {
            round: state.round,
            variant_id: state.variant_id.clone(),
            strict_score: state.strict.score,
            adjusted_strict: state.adjusted_strict,
            lenient_score: state.lenient.as_ref().map(|v| v.score),
            resolution: state.resolution.as_str().to_string(),
            at: Utc::now(),
        });
    }
}
