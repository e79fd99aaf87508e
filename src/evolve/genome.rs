//! Genomes and populations for the evolutionary search.

use serde::{Deserialize, Serialize};

/// A point in the search space: a base technique plus an ordered set of
/// modifiers, with fitness and lineage bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Identifier of the base technique.
    pub technique: String,
    /// Ordered modifier identifiers.
    pub modifiers: Vec<String>,
    /// Fitness assigned by the last evaluation (0 until evaluated).
    pub fitness: f64,
    /// Generation this genome belongs to.
    pub generation: u32,
    /// Ids of the one or two parents; empty for generation-zero genomes.
    pub parents: Vec<String>,
}

impl Genome {
    /// A fresh generation-zero genome.
    pub fn new(technique: impl Into<String>, modifiers: Vec<String>) -> Self {
        Self {
            technique: technique.into(),
            modifiers,
            fitness: 0.0,
            generation: 0,
            parents: Vec::new(),
        }
    }

    /// Stable identifier: technique, sorted modifiers, generation.
    pub fn id(&self) -> String {
        let mut sorted = self.modifiers.clone();
        sorted.sort();
        format!("{}_{}_g{}", self.technique, sorted.join("+"), self.generation)
    }

    pub fn modifier_count(&self) -> usize {
        self.modifiers.len()
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// An ordered set of genomes for one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    pub generation: u32,
    pub genomes: Vec<Genome>,
}

impl Population {
    pub fn new(generation: u32, genomes: Vec<Genome>) -> Self {
        Self {
            generation,
            genomes,
        }
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }
}
