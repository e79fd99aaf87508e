//! Evolution layer: genomes, the genetic-algorithm engine, and the
//! async driver that scores generations through an injected oracle.

mod driver;
mod engine;
mod genome;

pub use driver::{EvolutionDriver, EvolutionOutcome, ScoringOracle};
pub use engine::{
    EvaluatedGenome, EvolutionConfig, EvolutionEngine, EvolutionError, GenerationRecord,
};
pub use genome::{Genome, Population};
