//! Content pools: named, read-only collections of candidate fragments.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One candidate fragment, tagged with a category and a selection weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub category: String,

    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Fragment {
    pub fn new(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            weight: default_weight(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// A named, ordered, read-only collection of fragments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPool {
    pub name: String,
    fragments: Vec<Fragment>,
}

impl ContentPool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fragments: Vec::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Selection weights, index-aligned with [`ContentPool::fragments`].
    pub fn weights(&self) -> Vec<f64> {
        self.fragments.iter().map(|f| f.weight).collect()
    }
}

/// Read-only source of content pools, loaded once at startup.
///
/// A `target` narrows the lookup to target-specific pools when the
/// provider has them; providers fall back to the category-wide pool.
pub trait ContentPoolProvider: Send + Sync {
    fn pool(&self, category: &str, target: Option<&str>) -> Option<&ContentPool>;
}

/// In-memory provider backed by static maps.
#[derive(Debug, Default)]
pub struct StaticPools {
    by_category: HashMap<String, ContentPool>,
    by_target: HashMap<(String, String), ContentPool>,
}

impl StaticPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category-wide pool.
    pub fn insert(&mut self, category: impl Into<String>, pool: ContentPool) {
        self.by_category.insert(category.into(), pool);
    }

    /// Register a pool for a specific (category, target) pair.
    pub fn insert_for_target(
        &mut self,
        category: impl Into<String>,
        target: impl Into<String>,
        pool: ContentPool,
    ) {
        self.by_target.insert((category.into(), target.into()), pool);
    }

    pub fn categories(&self) -> Vec<&str> {
        self.by_category.keys().map(|k| k.as_str()).collect()
    }
}

impl ContentPoolProvider for StaticPools {
    fn pool(&self, category: &str, target: Option<&str>) -> Option<&ContentPool> {
        if let Some(target) = target
            && let Some(pool) = self
                .by_target
                .get(&(category.to_string(), target.to_string()))
        {
            return Some(pool);
        }
        self.by_category.get(category)
    }
}
