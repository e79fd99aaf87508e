//! Entropy levels and per-run entropy profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entropy intensity levels, ordered from subtle to near-complete
/// randomization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntropyLevel {
    /// Subtle variation (intensity 0.20).
    Minimal,
    /// Balanced variation (intensity 0.50).
    #[default]
    Moderate,
    /// Aggressive variation (intensity 0.75).
    High,
    /// Near-complete randomization (intensity 0.95).
    Maximum,
}

impl EntropyLevel {
    /// Numeric intensity in [0, 1] driving shuffle depth, flag
    /// probabilities, and jitter scale.
    pub fn intensity(self) -> f64 {
        match self {
            EntropyLevel::Minimal => 0.2,
            EntropyLevel::Moderate => 0.5,
            EntropyLevel::High => 0.75,
            EntropyLevel::Maximum => 0.95,
        }
    }

    /// Map an operation mode name to a level. Unknown modes fall back to
    /// `Moderate`.
    pub fn from_mode(mode: &str) -> Self {
        match mode.to_lowercase().as_str() {
            "stealth" => EntropyLevel::Minimal,
            "balanced" => EntropyLevel::Moderate,
            "aggressive" => EntropyLevel::High,
            "chaos" => EntropyLevel::Maximum,
            _ => EntropyLevel::Moderate,
        }
    }

    /// Single-letter tag used in entropy signatures.
    pub fn initial(self) -> char {
        match self {
            EntropyLevel::Minimal => 'M',
            EntropyLevel::Moderate => 'O',
            EntropyLevel::High => 'H',
            EntropyLevel::Maximum => 'X',
        }
    }
}

impl fmt::Display for EntropyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntropyLevel::Minimal => "minimal",
            EntropyLevel::Moderate => "moderate",
            EntropyLevel::High => "high",
            EntropyLevel::Maximum => "maximum",
        };
        write!(f, "{}", name)
    }
}

/// Entropy configuration for one generation run.
///
/// Created once when an engine is constructed (or reseeded) and immutable
/// afterwards. The boolean flags record which variation dimensions are
/// active for this run; they are drawn from the seeded generator so a
/// fixed seed reproduces the same profile.
#[derive(Debug, Clone, Serialize)]
pub struct EntropyProfile {
    /// The seed driving every draw in this run.
    pub seed: u64,
    /// Intensity level the profile was created at.
    pub level: EntropyLevel,
    /// Whether slot/component ordering may vary.
    pub ordering: bool,
    /// Whether delimiters vary between renders.
    pub delimiters: bool,
    /// Whether spacing runs vary.
    pub spacing: bool,
    /// Whether casing may vary.
    pub casing: bool,
    /// Whether structural mutation is active.
    pub structure: bool,
    /// Unique 12-hex-char run identifier.
    pub run_id: String,
    /// When this profile was created.
    pub created_at: DateTime<Utc>,
}

impl EntropyProfile {
    /// Compact signature for provenance tracking: `E<run8>-<level initial>`.
    pub fn signature(&self) -> String {
        format!("E{}-{}", &self.run_id[..8.min(self.run_id.len())], self.level.initial())
    }
}
