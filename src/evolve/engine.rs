//! The genetic-algorithm engine: selection, crossover, mutation,
//! elitism, and convergence detection.
//!
//! All operators are pure, synchronous computation; randomness comes
//! from the caller's [`EntropyEngine`] handle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entropy::EntropyEngine;
use crate::fitness::FitnessReport;
use crate::judge::Verdict;

use super::genome::{Genome, Population};

/// Errors from the evolution engine. These are configuration errors and
/// are surfaced to the caller, never papered over.
#[derive(Debug, Error)]
pub enum EvolutionError {
    #[error("no evaluated genomes to evolve from")]
    EmptyPopulation,

    #[error("no techniques registered")]
    NoTechniques,

    #[error("no modifiers registered")]
    NoModifiers,
}

/// Parameters of the genetic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    /// Top genomes copied verbatim into the next generation.
    pub elite_count: usize,
    /// Probability a filler child is mutated.
    pub mutation_rate: f64,
    /// Probability a filler child comes from crossover rather than
    /// direct reproduction.
    pub crossover_rate: f64,
    /// Tournament size; bounds selection pressure.
    pub tournament_k: usize,
    /// Generation budget for the driver.
    pub max_generations: u32,
    /// Generations inspected for convergence.
    pub convergence_window: usize,
    /// Best-fitness spread below which the search is converged.
    pub convergence_epsilon: f64,
    /// Concurrent genome evaluations in the driver.
    pub max_concurrency: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            elite_count: 2,
            mutation_rate: 0.3,
            crossover_rate: 0.7,
            tournament_k: 3,
            max_generations: 10,
            convergence_window: 3,
            convergence_epsilon: 0.1,
            max_concurrency: 4,
        }
    }
}

/// One genome with the verdicts and fitness it earned.
#[derive(Debug, Clone)]
pub struct EvaluatedGenome {
    pub genome: Genome,
    pub verdict_a: Verdict,
    pub verdict_b: Verdict,
    pub report: FitnessReport,
}

impl EvaluatedGenome {
    pub fn fitness(&self) -> f64 {
        self.report.fitness
    }
}

/// Best-of-generation record kept for convergence detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub best_fitness: f64,
    pub best_genome: Genome,
}

/// Genetic-algorithm loop over genomes.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    techniques: Vec<String>,
    modifiers: Vec<String>,
    generation: u32,
    history: Vec<GenerationRecord>,
}

impl EvolutionEngine {
    pub fn new(
        config: EvolutionConfig,
        techniques: Vec<String>,
        modifiers: Vec<String>,
    ) -> Result<Self, EvolutionError> {
        if techniques.is_empty() {
            return Err(EvolutionError::NoTechniques);
        }
        if modifiers.is_empty() {
            return Err(EvolutionError::NoModifiers);
        }

        Ok(Self {
            config,
            techniques,
            modifiers,
            generation: 0,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    /// Random starting population: each genome gets a random technique
    /// and one to three random modifiers.
    pub fn initialize_population(&self, entropy: &mut EntropyEngine) -> Population {
        let genomes = (0..self.config.population_size)
            .map(|_| {
                let technique = entropy
                    .choice(&self.techniques)
                    .cloned()
                    .unwrap_or_default();
                let count = entropy.int_range(1, 3);
                let modifiers = entropy.sample(&self.modifiers, count);
                Genome::new(technique, modifiers)
            })
            .collect();

        Population::new(self.generation, genomes)
    }

    /// Tournament selection: draw `tournament_k` genomes uniformly,
    /// return the fittest. `evaluated` must be non-empty.
    pub fn tournament_select<'a>(
        &self,
        entropy: &mut EntropyEngine,
        evaluated: &'a [EvaluatedGenome],
    ) -> &'a Genome {
        let k = self.config.tournament_k.clamp(1, evaluated.len());
        let mut best: Option<&EvaluatedGenome> = None;

        for _ in 0..k {
            let idx = entropy.int_range(0, evaluated.len() - 1);
            let candidate = &evaluated[idx];
            if best.map(|b| candidate.fitness() > b.fitness()).unwrap_or(true) {
                best = Some(candidate);
            }
        }

        &best.expect("tournament over non-empty population").genome
    }

    /// Crossover: technique uniformly from either parent; modifiers a
    /// random-size subset of the parents' union.
    pub fn crossover(
        &self,
        entropy: &mut EntropyEngine,
        parent_a: &Genome,
        parent_b: &Genome,
    ) -> Genome {
        let technique = if entropy.coin_flip(0.5) {
            parent_a.technique.clone()
        } else {
            parent_b.technique.clone()
        };

        let mut union: Vec<String> = parent_a.modifiers.clone();
        for modifier in &parent_b.modifiers {
            if !union.contains(modifier) {
                union.push(modifier.clone());
            }
        }

        let modifiers = if union.is_empty() {
            entropy.sample(&self.modifiers, 1)
        } else {
            let count = entropy.int_range(1, union.len().min(4));
            entropy.sample(&union, count)
        };

        Genome {
            technique,
            modifiers,
            fitness: 0.0,
            generation: self.generation + 1,
            parents: vec![parent_a.id(), parent_b.id()],
        }
    }

    /// Apply exactly one mutation: add an unused modifier, remove one if
    /// more than one remains, swap one for an unused one, or replace the
    /// base technique. An impossible draw substitutes the first valid
    /// alternative. Generation and lineage are left untouched; mutation
    /// alters genes, not ancestry.
    pub fn mutate(&self, entropy: &mut EntropyEngine, genome: &Genome) -> Genome {
        let mut mutated = genome.clone();

        let unused: Vec<String> = self
            .modifiers
            .iter()
            .filter(|m| !mutated.has_modifier(m))
            .cloned()
            .collect();
        let other_techniques: Vec<String> = self
            .techniques
            .iter()
            .filter(|t| **t != mutated.technique)
            .cloned()
            .collect();

        // Op order: add, remove, swap, rebase.
        let can = [
            !unused.is_empty(),
            mutated.modifiers.len() > 1,
            !mutated.modifiers.is_empty() && !unused.is_empty(),
            !other_techniques.is_empty(),
        ];

        let mut op = entropy.int_range(0, 3);
        if !can[op] {
            op = (0..4).find(|o| can[*o]).unwrap_or(op);
        }

        match op {
            0 if can[0] => {
                let added = entropy.choice(&unused).cloned().unwrap_or_default();
                mutated.modifiers.push(added);
            }
            1 if can[1] => {
                let idx = entropy.int_range(0, mutated.modifiers.len() - 1);
                mutated.modifiers.remove(idx);
            }
            2 if can[2] => {
                let idx = entropy.int_range(0, mutated.modifiers.len() - 1);
                if let Some(replacement) = entropy.choice(&unused) {
                    mutated.modifiers[idx] = replacement.clone();
                }
            }
            3 if can[3] => {
                if let Some(technique) = entropy.choice(&other_techniques) {
                    mutated.technique = technique.clone();
                }
            }
            _ => {}
        }

        mutated.fitness = 0.0;
        mutated
    }

    /// Advance one generation: record the best, copy elites verbatim,
    /// fill the remainder by crossover or tournament reproduction with
    /// optional mutation.
    pub fn evolve(
        &mut self,
        entropy: &mut EntropyEngine,
        evaluated: &[EvaluatedGenome],
    ) -> Result<Population, EvolutionError> {
        if evaluated.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }

        let mut sorted: Vec<&EvaluatedGenome> = evaluated.iter().collect();
        sorted.sort_by(|a, b| {
            b.fitness()
                .partial_cmp(&a.fitness())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let best = sorted[0];
        self.history.push(GenerationRecord {
            generation: self.generation,
            best_fitness: best.fitness(),
            best_genome: best.genome.clone(),
        });

        let next_generation = self.generation + 1;
        let mut next: Vec<Genome> = Vec::with_capacity(self.config.population_size);

        for elite in sorted.iter().take(self.config.elite_count) {
            let mut copy = elite.genome.clone();
            copy.fitness = elite.fitness();
            copy.parents = vec![elite.genome.id()];
            copy.generation = next_generation;
            next.push(copy);
        }

        while next.len() < self.config.population_size {
            let mut child = if entropy.coin_flip(self.config.crossover_rate) && evaluated.len() >= 2
            {
                let parent_a = self.tournament_select(entropy, evaluated).clone();
                let parent_b = self.tournament_select(entropy, evaluated).clone();
                self.crossover(entropy, &parent_a, &parent_b)
            } else {
                let parent = self.tournament_select(entropy, evaluated);
                Genome {
                    technique: parent.technique.clone(),
                    modifiers: parent.modifiers.clone(),
                    fitness: 0.0,
                    generation: next_generation,
                    parents: vec![parent.id()],
                }
            };

            if entropy.coin_flip(self.config.mutation_rate) {
                child = self.mutate(entropy, &child);
            }

            next.push(child);
        }

        self.generation = next_generation;
        Ok(Population::new(next_generation, next))
    }

    /// True when the best-of-generation spread over the last
    /// `convergence_window` generations is below `convergence_epsilon`.
    pub fn converged(&self) -> bool {
        let window = self.config.convergence_window;
        if window == 0 || self.history.len() < window {
            return false;
        }

        let recent = &self.history[self.history.len() - window..];
        let max = recent.iter().map(|r| r.best_fitness).fold(f64::MIN, f64::max);
        let min = recent.iter().map(|r| r.best_fitness).fold(f64::MAX, f64::min);
        max - min < self.config.convergence_epsilon
    }

    /// Best genome over the whole run, if any generation was recorded.
    pub fn best(&self) -> Option<&GenerationRecord> {
        self.history.iter().max_by(|a, b| {
            a.best_fitness
                .partial_cmp(&b.best_fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyLevel;
    use crate::fitness::{FitnessEvaluator, FitnessConfig};
    use crate::judge::Verdict;

    fn entropy(seed: u64) -> EntropyEngine {
        EntropyEngine::new(Some(seed), EntropyLevel::Moderate)
    }

    fn engine() -> EvolutionEngine {
        EvolutionEngine::new(
            EvolutionConfig::default(),
            vec!["frame".into(), "layered".into(), "minimal".into()],
            vec!["m1".into(), "m2".into(), "m3".into(), "m4".into(), "m5".into()],
        )
        .unwrap()
    }

    fn verdict(score: f64) -> Verdict {
        Verdict {
            score,
            rationale: String::new(),
            suggestion: String::new(),
            parsed: true,
            raw: String::new(),
        }
    }

    /// Deterministic fitness: monotone in modifier count up to a cap.
    fn capped_fitness(genome: &Genome) -> EvaluatedGenome {
        let score = (genome.modifier_count() as f64).min(4.0) + 3.0;
        let evaluator = FitnessEvaluator::new(FitnessConfig {
            efficiency_factor: 0.0,
            ..Default::default()
        });
        let report = evaluator.combined(&verdict(score), &verdict(score), genome);
        EvaluatedGenome {
            genome: genome.clone(),
            verdict_a: verdict(score),
            verdict_b: verdict(score),
            report,
        }
    }

    #[test]
    fn test_new_rejects_empty_registries() {
        assert!(matches!(
            EvolutionEngine::new(EvolutionConfig::default(), Vec::new(), vec!["m".into()]),
            Err(EvolutionError::NoTechniques)
        ));
        assert!(matches!(
            EvolutionEngine::new(EvolutionConfig::default(), vec!["t".into()], Vec::new()),
            Err(EvolutionError::NoModifiers)
        ));
    }

    #[test]
    fn test_initialize_population_size_and_shape() {
        let engine = engine();
        let mut e = entropy(42);
        let population = engine.initialize_population(&mut e);

        assert_eq!(population.len(), 10);
        for genome in &population.genomes {
            assert!(!genome.technique.is_empty());
            assert!((1..=3).contains(&genome.modifier_count()));
            assert_eq!(genome.generation, 0);
            assert!(genome.parents.is_empty());
        }
    }

    #[test]
    fn test_tournament_select_prefers_fitness() {
        let engine = engine();
        let mut e = entropy(1);

        let evaluated: Vec<EvaluatedGenome> = (0..5)
            .map(|i| {
                let genome = Genome::new(format!("t{}", i), vec![format!("m{}", i)]);
                let score = i as f64;
                let report = FitnessEvaluator::default().combined(
                    &verdict(score),
                    &verdict(score),
                    &genome,
                );
                EvaluatedGenome {
                    genome,
                    verdict_a: verdict(score),
                    verdict_b: verdict(score),
                    report,
                }
            })
            .collect();

        // With k = population size, the tournament must pick the global best.
        let mut full_k = engine;
        full_k.config.tournament_k = 5;
        let winner = full_k.tournament_select(&mut e, &evaluated);
        assert_eq!(winner.technique, "t4");
    }

    #[test]
    fn test_crossover_combines_parents() {
        let engine = engine();
        let mut e = entropy(7);

        let parent_a = Genome::new("frame", vec!["m1".into(), "m2".into()]);
        let parent_b = Genome::new("layered", vec!["m3".into()]);

        for _ in 0..20 {
            let child = engine.crossover(&mut e, &parent_a, &parent_b);
            assert!(child.technique == "frame" || child.technique == "layered");
            assert!(!child.modifiers.is_empty());
            assert!(child.modifiers.len() <= 3);
            for modifier in &child.modifiers {
                assert!(["m1", "m2", "m3"].contains(&modifier.as_str()));
            }
            assert_eq!(child.generation, 1);
            assert_eq!(child.parents.len(), 2);
        }
    }

    #[test]
    fn test_mutate_changes_exactly_one_axis() {
        let engine = engine();
        let mut e = entropy(3);
        let genome = Genome::new("frame", vec!["m1".into(), "m2".into()]);

        for _ in 0..50 {
            let mutated = engine.mutate(&mut e, &genome);
            let technique_changed = mutated.technique != genome.technique;
            let modifiers_changed = mutated.modifiers != genome.modifiers;
            assert!(
                technique_changed ^ modifiers_changed,
                "exactly one axis must change: {:?}",
                mutated
            );
            assert_eq!(mutated.generation, genome.generation);
            assert_eq!(mutated.parents, genome.parents);
        }
    }

    #[test]
    fn test_mutate_impossible_op_substitutes_valid_one() {
        // All modifiers already present: "add" is impossible and must be
        // substituted, never a no-op crash.
        let engine = EvolutionEngine::new(
            EvolutionConfig::default(),
            vec!["only".into()],
            vec!["m1".into(), "m2".into()],
        )
        .unwrap();
        let mut e = entropy(9);
        let genome = Genome::new("only", vec!["m1".into(), "m2".into()]);

        for _ in 0..30 {
            let mutated = engine.mutate(&mut e, &genome);
            // Only "remove" is valid here (single technique, no unused
            // modifiers), so every mutation must shrink the set.
            assert_eq!(mutated.modifiers.len(), 1);
        }
    }

    #[test]
    fn test_evolve_preserves_population_size() {
        let mut engine = engine();
        let mut e = entropy(42);
        let population = engine.initialize_population(&mut e);
        let evaluated: Vec<EvaluatedGenome> =
            population.genomes.iter().map(capped_fitness).collect();

        let next = engine.evolve(&mut e, &evaluated).unwrap();
        assert_eq!(next.len(), 10);
        assert_eq!(next.generation, 1);
        for genome in &next.genomes {
            assert_eq!(genome.generation, 1);
        }
    }

    #[test]
    fn test_evolve_empty_population_is_fatal() {
        let mut engine = engine();
        let mut e = entropy(1);
        let result = engine.evolve(&mut e, &[]);
        assert!(matches!(result, Err(EvolutionError::EmptyPopulation)));
    }

    #[test]
    fn test_elites_survive_verbatim() {
        let mut engine = engine();
        let mut e = entropy(11);
        let population = engine.initialize_population(&mut e);
        let evaluated: Vec<EvaluatedGenome> =
            population.genomes.iter().map(capped_fitness).collect();

        let mut best: Vec<&EvaluatedGenome> = evaluated.iter().collect();
        best.sort_by(|a, b| b.fitness().partial_cmp(&a.fitness()).unwrap());
        let top_genes: Vec<(String, Vec<String>)> = best[..2]
            .iter()
            .map(|e| (e.genome.technique.clone(), e.genome.modifiers.clone()))
            .collect();

        let next = engine.evolve(&mut e, &evaluated).unwrap();
        for (i, (technique, modifiers)) in top_genes.iter().enumerate() {
            assert_eq!(&next.genomes[i].technique, technique);
            assert_eq!(&next.genomes[i].modifiers, modifiers);
        }
    }

    #[test]
    fn test_best_fitness_never_regresses_with_elitism() {
        let mut engine = engine();
        let mut e = entropy(42);
        let mut population = engine.initialize_population(&mut e);

        let mut last_best = f64::NEG_INFINITY;
        for _ in 0..5 {
            let evaluated: Vec<EvaluatedGenome> =
                population.genomes.iter().map(capped_fitness).collect();
            population = engine.evolve(&mut e, &evaluated).unwrap();

            let best = engine.history().last().unwrap().best_fitness;
            assert!(best >= last_best, "best fitness regressed: {} < {}", best, last_best);
            last_best = best;
        }
    }

    #[test]
    fn test_convergence_detection() {
        let mut engine = engine();
        assert!(!engine.converged());

        for generation in 0..3 {
            engine.history.push(GenerationRecord {
                generation,
                best_fitness: 5.0 + generation as f64 * 0.01,
                best_genome: Genome::new("t", Vec::new()),
            });
        }
        assert!(engine.converged());

        engine.history.push(GenerationRecord {
            generation: 3,
            best_fitness: 9.0,
            best_genome: Genome::new("t", Vec::new()),
        });
        assert!(!engine.converged());
    }

    #[test]
    fn test_best_returns_overall_maximum() {
        let mut engine = engine();
        for (generation, fitness) in [(0, 2.0), (1, 7.5), (2, 4.0)] {
            engine.history.push(GenerationRecord {
                generation,
                best_fitness: fitness,
                best_genome: Genome::new("t", Vec::new()),
            });
        }

        let best = engine.best().unwrap();
        assert_eq!(best.generation, 1);
        assert_eq!(best.best_fitness, 7.5);
    }
}
