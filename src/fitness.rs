//! Multi-objective fitness evaluation.
//!
//! Reduces two judge verdicts plus a genome's complexity into a scalar:
//! a weighted score sum, a binary bonus when both judges clear the
//! threshold at once, a consistency bonus for judge agreement, and an
//! efficiency penalty that prefers fewer modifiers at equal
//! effectiveness.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evolve::Genome;
use crate::judge::Verdict;

/// Weights and thresholds for fitness evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Weight of judge A's score.
    pub weight_a: f64,
    /// Weight of judge B's score.
    pub weight_b: f64,
    /// Both scores must reach this for the bypass bonus.
    pub threshold: f64,
    /// Flat bonus when both judges clear the threshold.
    pub bypass_bonus: f64,
    /// Score difference under which agreement earns a bonus.
    pub allowed_diff: f64,
    /// Scale of the consistency bonus.
    pub consistency_factor: f64,
    /// Penalty per modifier carried by the genome.
    pub efficiency_factor: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            weight_a: 0.5,
            weight_b: 0.5,
            threshold: 7.0,
            bypass_bonus: 2.0,
            allowed_diff: 5.0,
            consistency_factor: 0.1,
            efficiency_factor: 0.1,
        }
    }
}

/// Qualitative tags attached to a fitness report for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitnessTag {
    /// Both judges cleared the threshold simultaneously.
    ThresholdMet,
    /// The judges' scores differ by at most one point.
    HighAgreement,
    /// The genome carries at most two modifiers.
    Efficient,
}

impl fmt::Display for FitnessTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitnessTag::ThresholdMet => "threshold-met",
            FitnessTag::HighAgreement => "high-agreement",
            FitnessTag::Efficient => "efficient",
        };
        write!(f, "{}", name)
    }
}

/// The components of one fitness evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessReport {
    pub fitness: f64,
    pub score_a: f64,
    pub score_b: f64,
    pub weighted: f64,
    pub bypass_achieved: bool,
    pub consistency_bonus: f64,
    pub efficiency_penalty: f64,
    pub tags: Vec<FitnessTag>,
}

impl FitnessReport {
    /// Tags rendered for metric sinks.
    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.to_string()).collect()
    }
}

/// Reduces verdicts and genome complexity to a scalar fitness.
#[derive(Debug, Clone, Default)]
pub struct FitnessEvaluator {
    config: FitnessConfig,
}

impl FitnessEvaluator {
    pub fn new(config: FitnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitnessConfig {
        &self.config
    }

    /// Combined fitness of a genome given both judges' verdicts.
    pub fn combined(&self, verdict_a: &Verdict, verdict_b: &Verdict, genome: &Genome) -> FitnessReport {
        let cfg = &self.config;
        let (a, b) = (verdict_a.score, verdict_b.score);

        let weighted = a * cfg.weight_a + b * cfg.weight_b;

        let bypass_achieved = a >= cfg.threshold && b >= cfg.threshold;
        let bypass = if bypass_achieved { cfg.bypass_bonus } else { 0.0 };

        let diff = (a - b).abs();
        let consistency_bonus = (cfg.allowed_diff - diff).max(0.0) * cfg.consistency_factor;

        let modifier_count = genome.modifier_count() as f64;
        let efficiency_penalty = modifier_count * cfg.efficiency_factor;

        let fitness = weighted + bypass + consistency_bonus - efficiency_penalty;

        let mut tags = Vec::new();
        if bypass_achieved {
            tags.push(FitnessTag::ThresholdMet);
        }
        if diff <= 1.0 {
            tags.push(FitnessTag::HighAgreement);
        }
        if genome.modifier_count() <= 2 {
            tags.push(FitnessTag::Efficient);
        }

        FitnessReport {
            fitness,
            score_a: a,
            score_b: b,
            weighted,
            bypass_achieved,
            consistency_bonus,
            efficiency_penalty,
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(score: f64) -> Verdict {
        Verdict {
            score,
            rationale: String::new(),
            suggestion: String::new(),
            parsed: true,
            raw: String::new(),
        }
    }

    fn genome_with_modifiers(count: usize) -> Genome {
        let modifiers: Vec<String> = (0..count).map(|i| format!("m{}", i)).collect();
        Genome::new("base", modifiers)
    }

    #[test]
    fn test_weighted_sum() {
        let evaluator = FitnessEvaluator::default();
        let report = evaluator.combined(&verdict(8.0), &verdict(6.0), &genome_with_modifiers(0));
        assert_eq!(report.weighted, 7.0);
    }

    #[test]
    fn test_bypass_bonus_requires_both_judges() {
        let evaluator = FitnessEvaluator::default();

        let both = evaluator.combined(&verdict(8.0), &verdict(7.0), &genome_with_modifiers(0));
        assert!(both.bypass_achieved);

        let one = evaluator.combined(&verdict(9.0), &verdict(5.0), &genome_with_modifiers(0));
        assert!(!one.bypass_achieved);
        assert!(both.fitness > one.fitness);
    }

    #[test]
    fn test_consistency_bonus_rewards_agreement() {
        let evaluator = FitnessEvaluator::default();

        let agree = evaluator.combined(&verdict(6.0), &verdict(6.0), &genome_with_modifiers(0));
        let disagree = evaluator.combined(&verdict(9.0), &verdict(3.0), &genome_with_modifiers(0));

        // Same weighted mean, but agreement earns the larger bonus.
        assert_eq!(agree.weighted, disagree.weighted);
        assert!(agree.consistency_bonus > disagree.consistency_bonus);
        assert!(agree.fitness > disagree.fitness);
    }

    #[test]
    fn test_efficiency_penalty_scales_with_modifiers() {
        let evaluator = FitnessEvaluator::default();

        let lean = evaluator.combined(&verdict(6.0), &verdict(6.0), &genome_with_modifiers(1));
        let heavy = evaluator.combined(&verdict(6.0), &verdict(6.0), &genome_with_modifiers(5));

        assert!(lean.fitness > heavy.fitness);
        assert_eq!(heavy.efficiency_penalty, 0.5);
    }

    #[test]
    fn test_monotonic_in_each_score() {
        let evaluator = FitnessEvaluator::default();
        let genome = genome_with_modifiers(2);

        let mut last = f64::NEG_INFINITY;
        for score in 0..=10 {
            let report = evaluator.combined(&verdict(score as f64), &verdict(5.0), &genome);
            assert!(
                report.fitness >= last,
                "fitness regressed at score_a={}",
                score
            );
            last = report.fitness;
        }

        let mut last = f64::NEG_INFINITY;
        for score in 0..=10 {
            let report = evaluator.combined(&verdict(5.0), &verdict(score as f64), &genome);
            assert!(
                report.fitness >= last,
                "fitness regressed at score_b={}",
                score
            );
            last = report.fitness;
        }
    }

    #[test]
    fn test_tags() {
        let evaluator = FitnessEvaluator::default();

        let report = evaluator.combined(&verdict(8.0), &verdict(8.0), &genome_with_modifiers(1));
        assert!(report.tags.contains(&FitnessTag::ThresholdMet));
        assert!(report.tags.contains(&FitnessTag::HighAgreement));
        assert!(report.tags.contains(&FitnessTag::Efficient));

        let report = evaluator.combined(&verdict(9.0), &verdict(2.0), &genome_with_modifiers(4));
        assert!(report.tags.is_empty());
        assert_eq!(report.tag_names(), Vec::<String>::new());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(FitnessTag::ThresholdMet.to_string(), "threshold-met");
        assert_eq!(FitnessTag::HighAgreement.to_string(), "high-agreement");
        assert_eq!(FitnessTag::Efficient.to_string(), "efficient");
    }
}
