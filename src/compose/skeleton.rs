//! Skeletons: structural blueprints with named slots and template text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Position hint for a slot within its skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotPosition {
    Early,
    #[default]
    Middle,
    Late,
}

/// A named placeholder belonging to a skeleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    /// Placeholder name; must match a `{name}` token in the template.
    pub name: String,

    /// Whether rendering fails when no content is supplied.
    #[serde(default)]
    pub required: bool,

    /// Position hint used for group-wise shuffling.
    #[serde(default)]
    pub position: SlotPosition,

    /// Expected content category, matched against pool categories.
    #[serde(default = "default_category")]
    pub category: String,

    /// Priority weight; heavier slots move less when order is shuffled.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_category() -> String {
    "any".to_string()
}

fn default_weight() -> f64 {
    1.0
}

impl Slot {
    /// Create an optional middle slot with category `any`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            position: SlotPosition::Middle,
            category: default_category(),
            weight: default_weight(),
        }
    }

    /// Mark the slot required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the position hint.
    pub fn at(mut self, position: SlotPosition) -> Self {
        self.position = position;
        self
    }

    /// Set the expected content category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Set the priority weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// A structural blueprint: ordered slots plus literal template text.
///
/// Affinity maps score how well the skeleton suits an operation mode or a
/// target; `entropy_tolerance` bounds how much selection jitter and slot
/// shuffling this skeleton accepts before losing coherence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skeleton {
    pub id: String,
    pub slots: Vec<Slot>,
    pub template: String,

    #[serde(default)]
    pub mode_affinity: HashMap<String, f64>,

    #[serde(default)]
    pub target_affinity: HashMap<String, f64>,

    #[serde(default = "default_tolerance")]
    pub entropy_tolerance: f64,
}

fn default_tolerance() -> f64 {
    0.5
}

impl Skeleton {
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slots: Vec::new(),
            template: template.into(),
            mode_affinity: HashMap::new(),
            target_affinity: HashMap::new(),
            entropy_tolerance: default_tolerance(),
        }
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_mode_affinity(mut self, mode: impl Into<String>, affinity: f64) -> Self {
        self.mode_affinity.insert(mode.into(), affinity);
        self
    }

    pub fn with_target_affinity(mut self, target: impl Into<String>, affinity: f64) -> Self {
        self.target_affinity.insert(target.into(), affinity);
        self
    }

    pub fn with_entropy_tolerance(mut self, tolerance: f64) -> Self {
        self.entropy_tolerance = tolerance.clamp(0.0, 1.0);
        self
    }

    /// Look up a slot by name.
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Names of all required slots.
    pub fn required_slots(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.required)
            .map(|s| s.name.as_str())
            .collect()
    }
}
