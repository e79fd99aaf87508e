//! Async driver for the evolutionary search.
//!
//! The genetic operators are pure and synchronous; the only suspension
//! point is genome scoring through the injected [`ScoringOracle`].
//! Genomes within one generation have no data dependency and are scored
//! concurrently under a bounded worker pool, but all evaluations join
//! before the selection step.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::info;
use std::sync::Arc;

use crate::entropy::EntropyEngine;
use crate::fitness::FitnessEvaluator;
use crate::judge::Verdict;
use crate::metrics::{MetricEvent, MetricsSink, NullSink};

use super::engine::{EvaluatedGenome, EvolutionEngine, EvolutionError, GenerationRecord};
use super::genome::{Genome, Population};

/// Scores one genome with both judges.
///
/// Implementations own the genome-to-variant mapping and the judge
/// plumbing; retry exhaustion must surface as fallback verdicts, never
/// errors, so the search always progresses. The sub-seed gives each
/// evaluation an independent deterministic entropy stream.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn evaluate(&self, genome: &Genome, subseed: u64) -> (Verdict, Verdict);
}

/// Result of a full evolutionary run.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    /// Best genome over the whole run.
    pub best: Genome,
    pub best_fitness: f64,
    /// Generations actually evolved.
    pub generations: u32,
    /// Whether the run stopped on convergence rather than budget.
    pub converged: bool,
    pub history: Vec<GenerationRecord>,
}

/// Runs the genetic loop against a scoring oracle.
pub struct EvolutionDriver {
    engine: EvolutionEngine,
    fitness: FitnessEvaluator,
    oracle: Arc<dyn ScoringOracle>,
    metrics: Arc<dyn MetricsSink>,
}

impl EvolutionDriver {
    pub fn new(
        engine: EvolutionEngine,
        fitness: FitnessEvaluator,
        oracle: Arc<dyn ScoringOracle>,
    ) -> Self {
        Self {
            engine,
            fitness,
            oracle,
            metrics: Arc::new(NullSink),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run until the generation budget is spent or convergence is
    /// detected. Always returns a best-effort outcome; an empty
    /// population is the one fatal configuration error.
    pub async fn run(
        &mut self,
        entropy: &mut EntropyEngine,
    ) -> Result<EvolutionOutcome, EvolutionError> {
        let mut population = self.engine.initialize_population(entropy);
        if population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let max_generations = self.engine.config().max_generations;
        let mut converged = false;

        for _ in 0..max_generations {
            let evaluated = self.evaluate_population(entropy, &population).await;
            population = self.engine.evolve(entropy, &evaluated)?;

            let record = self.engine.history().last();
            info!(
                "generation {} best fitness {:.3}",
                self.engine.generation(),
                record.map(|r| r.best_fitness).unwrap_or_default()
            );

            if self.engine.converged() {
                converged = true;
                break;
            }
        }

        let best = self
            .engine
            .best()
            .cloned()
            .ok_or(EvolutionError::EmptyPopulation)?;

        Ok(EvolutionOutcome {
            best: best.best_genome,
            best_fitness: best.best_fitness,
            generations: self.engine.generation(),
            converged,
            history: self.engine.history().to_vec(),
        })
    }

    /// Score every genome of a generation concurrently, bounded by
    /// `max_concurrency`, and join before returning (the selection
    /// barrier).
    async fn evaluate_population(
        &self,
        entropy: &EntropyEngine,
        population: &Population,
    ) -> Vec<EvaluatedGenome> {
        let concurrency = self.engine.config().max_concurrency.max(1);
        let generation = population.generation as u64;

        let tasks = population.genomes.iter().enumerate().map(|(idx, genome)| {
            let oracle = Arc::clone(&self.oracle);
            let subseed = entropy.derive_subseed((generation << 32) | idx as u64);
            let genome = genome.clone();
            async move {
                let (verdict_a, verdict_b) = oracle.evaluate(&genome, subseed).await;
                (genome, verdict_a, verdict_b)
            }
        });

        let scored: Vec<(Genome, Verdict, Verdict)> = stream::iter(tasks)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        scored
            .into_iter()
            .map(|(mut genome, verdict_a, verdict_b)| {
                let report = self.fitness.combined(&verdict_a, &verdict_b, &genome);
                genome.fitness = report.fitness;

                self.metrics.record(MetricEvent::GenomeEvaluated {
                    genome_id: genome.id(),
                    generation: genome.generation,
                    score_a: report.score_a,
                    score_b: report.score_b,
                    fitness: report.fitness,
                    tags: report.tag_names(),
                    at: Utc::now(),
                });

                EvaluatedGenome {
                    genome,
                    verdict_a,
                    verdict_b,
                    report,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyLevel;
    use crate::evolve::engine::EvolutionConfig;
    use crate::metrics::RecordingSink;

    fn verdict(score: f64) -> Verdict {
        Verdict {
            score,
            rationale: String::new(),
            suggestion: String::new(),
            parsed: true,
            raw: String::new(),
        }
    }

    /// Oracle whose scores grow with modifier count up to a cap —
    /// deterministic and independent of the sub-seed.
    struct CappedOracle;

    #[async_trait]
    impl ScoringOracle for CappedOracle {
        async fn evaluate(&self, genome: &Genome, _subseed: u64) -> (Verdict, Verdict) {
            let score = (genome.modifier_count() as f64).min(4.0) + 3.0;
            (verdict(score), verdict(score))
        }
    }

    fn driver(config: EvolutionConfig) -> EvolutionDriver {
        let engine = EvolutionEngine::new(
            config,
            vec!["frame".into(), "layered".into()],
            vec!["m1".into(), "m2".into(), "m3".into(), "m4".into(), "m5".into()],
        )
        .unwrap();
        EvolutionDriver::new(engine, FitnessEvaluator::default(), Arc::new(CappedOracle))
    }

    #[tokio::test]
    async fn test_run_returns_best_effort_outcome() {
        let mut d = driver(EvolutionConfig {
            max_generations: 5,
            convergence_window: 0,
            ..Default::default()
        });
        let mut entropy = EntropyEngine::new(Some(42), EntropyLevel::Moderate);

        let outcome = d.run(&mut entropy).await.unwrap();
        assert!(outcome.generations >= 1);
        assert!(outcome.best_fitness > 0.0);
        assert_eq!(outcome.history.len(), outcome.generations as usize);
    }

    #[tokio::test]
    async fn test_run_never_regresses_best_fitness() {
        let mut d = driver(EvolutionConfig {
            population_size: 10,
            elite_count: 2,
            max_generations: 5,
            convergence_window: 0,
            ..Default::default()
        });
        let mut entropy = EntropyEngine::new(Some(42), EntropyLevel::Moderate);

        let outcome = d.run(&mut entropy).await.unwrap();
        let bests: Vec<f64> = outcome.history.iter().map(|r| r.best_fitness).collect();
        for window in bests.windows(2) {
            assert!(window[1] >= window[0], "best fitness regressed: {:?}", bests);
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_convergence() {
        // A constant-fitness oracle converges within the window.
        struct FlatOracle;

        #[async_trait]
        impl ScoringOracle for FlatOracle {
            async fn evaluate(&self, _genome: &Genome, _subseed: u64) -> (Verdict, Verdict) {
                (verdict(5.0), verdict(5.0))
            }
        }

        let engine = EvolutionEngine::new(
            EvolutionConfig {
                max_generations: 50,
                convergence_window: 3,
                convergence_epsilon: 0.5,
                ..Default::default()
            },
            vec!["t".into()],
            vec!["m1".into(), "m2".into()],
        )
        .unwrap();
        // Modifier counts drift, so zero out the efficiency term to keep
        // fitness flat.
        let fitness = FitnessEvaluator::new(crate::fitness::FitnessConfig {
            efficiency_factor: 0.0,
            ..Default::default()
        });
        let mut d = EvolutionDriver::new(engine, fitness, Arc::new(FlatOracle));

        let mut entropy = EntropyEngine::new(Some(7), EntropyLevel::Moderate);
        let outcome = d.run(&mut entropy).await.unwrap();

        assert!(outcome.converged);
        assert!(outcome.generations < 50);
    }

    #[tokio::test]
    async fn test_empty_population_is_fatal() {
        let mut d = driver(EvolutionConfig {
            population_size: 0,
            ..Default::default()
        });
        let mut entropy = EntropyEngine::new(Some(1), EntropyLevel::Moderate);

        let result = d.run(&mut entropy).await;
        assert!(matches!(result, Err(EvolutionError::EmptyPopulation)));
    }

    #[tokio::test]
    async fn test_metrics_record_every_evaluation() {
        let sink = Arc::new(RecordingSink::new());
        let mut d = driver(EvolutionConfig {
            population_size: 4,
            max_generations: 2,
            convergence_window: 0,
            ..Default::default()
        })
        .with_metrics(sink.clone());

        let mut entropy = EntropyEngine::new(Some(42), EntropyLevel::Moderate);
        d.run(&mut entropy).await.unwrap();

        // 4 genomes × 2 generations.
        assert_eq!(sink.len(), 8);
    }
}
