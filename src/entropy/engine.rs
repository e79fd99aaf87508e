//! The seeded randomness source behind all structural variation.
//!
//! Every pseudorandom draw in a run routes through one `EntropyEngine`,
//! so a fixed seed reproduces an entire run. The engine is owned and
//! passed by handle into every call; there is no global generator.
//! Concurrent evaluation derives independent sub-seeds via [`EntropyEngine::child`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use super::pools;
use super::profile::{EntropyLevel, EntropyProfile};

/// Kinds of delimiter the engine can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterKind {
    Section,
    Subsection,
}

/// Contexts for spacing draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingContext {
    Tight,
    Normal,
    Loose,
}

/// Character sets for noise generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseCharset {
    Alpha,
    Numeric,
    AlphaNumeric,
    Mixed,
    Symbols,
}

impl NoiseCharset {
    fn chars(self) -> &'static str {
        match self {
            NoiseCharset::Alpha => pools::CHARSET_ALPHA,
            NoiseCharset::Numeric => pools::CHARSET_NUMERIC,
            NoiseCharset::AlphaNumeric => pools::CHARSET_ALPHANUMERIC,
            NoiseCharset::Mixed => pools::CHARSET_MIXED,
            NoiseCharset::Symbols => pools::CHARSET_SYMBOLS,
        }
    }
}

/// Single controlled randomness source for a run.
pub struct EntropyEngine {
    seed: u64,
    level: EntropyLevel,
    rng: StdRng,
    profile: EntropyProfile,
}

impl EntropyEngine {
    /// Create an engine. When `seed` is `None`, one is derived from
    /// multiple ambient sources (wall-clock nanoseconds, an OS-generator
    /// draw, the process id, and a random tag) combined through SHA-256.
    /// Supplying a seed makes the run fully deterministic.
    pub fn new(seed: Option<u64>, level: EntropyLevel) -> Self {
        let seed = seed.unwrap_or_else(derive_ambient_seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let profile = build_profile(&mut rng, seed, level);

        Self {
            seed,
            level,
            rng,
            profile,
        }
    }

    /// Create an engine for an operation mode name (`stealth`, `balanced`,
    /// `aggressive`, `chaos`).
    pub fn from_mode(mode: &str, seed: Option<u64>) -> Self {
        Self::new(seed, EntropyLevel::from_mode(mode))
    }

    /// Start a new run: fresh seed (derived if `None`), fresh profile and
    /// run id.
    pub fn reseed(&mut self, seed: Option<u64>) {
        let seed = seed.unwrap_or_else(derive_ambient_seed);
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.profile = build_profile(&mut self.rng, seed, self.level);
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn level(&self) -> EntropyLevel {
        self.level
    }

    pub fn profile(&self) -> &EntropyProfile {
        &self.profile
    }

    pub fn run_id(&self) -> &str {
        &self.profile.run_id
    }

    /// Compact signature for provenance tracking.
    pub fn signature(&self) -> String {
        self.profile.signature()
    }

    /// Derive a sub-seed for an indexed unit of concurrent work. Stable
    /// for a given (seed, index) pair, independent of generator state.
    pub fn derive_subseed(&self, index: u64) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_be_bytes());
        hasher.update(index.to_be_bytes());
        truncate_digest(&hasher.finalize())
    }

    /// Spawn an independently seeded engine for an indexed unit of work.
    pub fn child(&self, index: u64) -> EntropyEngine {
        EntropyEngine::new(Some(self.derive_subseed(index)), self.level)
    }

    // ── primitive draws ────────────────────────────────────────────────

    /// Random boolean with the given probability of `true`.
    pub fn coin_flip(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    /// Random float in `[lo, hi)`. Degenerate ranges return `lo`.
    pub fn range_value(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..hi)
    }

    /// Random integer in `[lo, hi]` inclusive. Degenerate ranges return `lo`.
    pub fn int_range(&mut self, lo: usize, hi: usize) -> usize {
        if hi <= lo {
            return lo;
        }
        self.rng.random_range(lo..=hi)
    }

    /// Uniform choice. Empty input yields `None`.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..items.len());
        Some(&items[idx])
    }

    /// Sample up to `k` items without replacement, preserving nothing of
    /// the original order.
    pub fn sample<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let k = k.min(items.len());
        let mut indices: Vec<usize> = (0..items.len()).collect();
        let mut picked = Vec::with_capacity(k);
        for _ in 0..k {
            let at = self.rng.random_range(0..indices.len());
            picked.push(items[indices.swap_remove(at)].clone());
        }
        picked
    }

    /// Categorical sampling after temperature-rescaling the weights.
    ///
    /// Temperature below 1 sharpens toward the maximum weight; above 1
    /// flattens toward uniform. Mismatched weight lengths or a degenerate
    /// weight sum degrade to uniform choice. Empty input yields `None`.
    pub fn weighted_choice<'a, T>(
        &mut self,
        items: &'a [T],
        weights: &[f64],
        temperature: f64,
    ) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        if weights.len() != items.len() {
            return self.choice(items);
        }

        let exponent = if temperature > 0.0 { 1.0 / temperature } else { 1.0 };
        let scaled: Vec<f64> = weights
            .iter()
            .map(|w| if *w > 0.0 { w.powf(exponent) } else { 0.0 })
            .collect();

        let total: f64 = scaled.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return self.choice(items);
        }

        let mut target = self.rng.random_range(0.0..total);
        for (item, w) in items.iter().zip(&scaled) {
            target -= w;
            if target <= 0.0 {
                return Some(item);
            }
        }
        items.last()
    }

    // ── shuffling ──────────────────────────────────────────────────────

    /// Partial shuffle: `floor(n * intensity)` random pairwise swaps.
    ///
    /// Intensity 0 leaves the order unchanged; intensity 1 performs `n`
    /// swaps. Inputs shorter than two items are returned as-is.
    pub fn partial_shuffle<T: Clone>(&mut self, items: &[T], intensity: f64) -> Vec<T> {
        let mut result: Vec<T> = items.to_vec();
        if result.len() < 2 || intensity <= 0.0 {
            return result;
        }

        let swaps = (result.len() as f64 * intensity.min(1.0)).floor() as usize;
        for _ in 0..swaps {
            let i = self.rng.random_range(0..result.len());
            let mut j = self.rng.random_range(0..result.len() - 1);
            if j >= i {
                j += 1;
            }
            result.swap(i, j);
        }
        result
    }

    /// Order-preserving weighted shuffle: items with higher weight move
    /// less from their original position, bounded by a variance inversely
    /// proportional to their weight. Mismatched weight lengths degrade to
    /// a plain partial shuffle at the engine's level intensity.
    pub fn weighted_order_preserving_shuffle<T: Clone>(
        &mut self,
        items: &[T],
        weights: &[f64],
    ) -> Vec<T> {
        if weights.len() != items.len() {
            let intensity = self.level.intensity();
            return self.partial_shuffle(items, intensity);
        }
        if items.len() < 2 {
            return items.to_vec();
        }

        // Heaviest items claim positions first, so they see the most
        // candidates near their origin.
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|a, b| {
            weights[*b]
                .partial_cmp(&weights[*a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut placed: Vec<Option<T>> = vec![None; items.len()];
        let mut free: Vec<usize> = (0..items.len()).collect();

        for orig_idx in order {
            let weight = weights[orig_idx].clamp(0.0, 1.0);
            let variance =
                ((1.0 - weight) * free.len() as f64 * self.level.intensity()) as usize;
            let bound = variance.max(1);

            let candidates: Vec<usize> = free
                .iter()
                .copied()
                .filter(|p| p.abs_diff(orig_idx) <= bound)
                .collect();
            let pool = if candidates.is_empty() { &free } else { &candidates };

            let pos = pool[self.rng.random_range(0..pool.len())];
            placed[pos] = Some(items[orig_idx].clone());
            free.retain(|p| *p != pos);
        }

        placed.into_iter().flatten().collect()
    }

    // ── formatting draws ───────────────────────────────────────────────

    /// Random delimiter of the given kind.
    pub fn delimiter(&mut self, kind: DelimiterKind) -> &'static str {
        let pool = match kind {
            DelimiterKind::Section => pools::SECTION_DELIMITERS,
            DelimiterKind::Subsection => pools::SUBSECTION_DELIMITERS,
        };
        pool[self.rng.random_range(0..pool.len())]
    }

    /// Random bullet character.
    pub fn bullet(&mut self) -> &'static str {
        pools::BULLETS[self.rng.random_range(0..pools::BULLETS.len())]
    }

    /// Matching random bracket pair.
    pub fn bracket_pair(&mut self) -> (&'static str, &'static str) {
        let idx = self.rng.random_range(0..pools::BRACKET_OPEN.len());
        (pools::BRACKET_OPEN[idx], pools::BRACKET_CLOSE[idx])
    }

    /// Format a section header with a random style.
    pub fn format_header(&mut self, name: &str) -> String {
        let (prefix, suffix) =
            pools::HEADER_FORMATS[self.rng.random_range(0..pools::HEADER_FORMATS.len())];
        format!("{}{}{}", prefix, name, suffix)
    }

    /// Format an index number with a random style.
    pub fn format_index(&mut self, n: usize) -> String {
        match self.rng.random_range(0..8) {
            0 => format!("{}.", n),
            1 => format!("{})", n),
            2 => format!("({})", n),
            3 => format!("[{}]", n),
            4 => format!("#{}", n),
            5 => format!("{}:", n),
            6 => format!("{:02}.", n),
            _ => format!("{:02})", n),
        }
    }

    /// Contextual spacing run.
    pub fn spacing(&mut self, context: SpacingContext) -> &'static str {
        let pool = match context {
            SpacingContext::Tight => pools::SPACING_TIGHT,
            SpacingContext::Normal => pools::SPACING_NORMAL,
            SpacingContext::Loose => pools::SPACING_LOOSE,
        };
        pool[self.rng.random_range(0..pool.len())]
    }

    /// Random tag/noise string from the given charset.
    pub fn noise(&mut self, len: usize, charset: NoiseCharset) -> String {
        let chars: Vec<char> = charset.chars().chars().collect();
        (0..len)
            .map(|_| chars[self.rng.random_range(0..chars.len())])
            .collect()
    }
}

impl std::fmt::Debug for EntropyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyEngine")
            .field("seed", &self.seed)
            .field("level", &self.level)
            .field("run_id", &self.profile.run_id)
            .finish()
    }
}

/// Derive a seed from multiple independent ambient sources combined
/// through a strong hash.
fn derive_ambient_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let draw: u64 = rand::rng().random();
    let pid = std::process::id();
    let tag: String = {
        let chars: Vec<char> = pools::CHARSET_ALPHA.chars().collect();
        let mut rng = rand::rng();
        (0..16).map(|_| chars[rng.random_range(0..chars.len())]).collect()
    };

    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}|{}", nanos, draw, pid, tag));
    truncate_digest(&hasher.finalize())
}

fn build_profile(rng: &mut StdRng, seed: u64, level: EntropyLevel) -> EntropyProfile {
    let intensity = level.intensity();
    let created_at = chrono::Utc::now();

    // Flag draw order is fixed; it is part of the deterministic stream.
    let ordering = rng.random_range(0.0..1.0) < intensity;
    let delimiters = rng.random_range(0.0..1.0) < intensity;
    let spacing = rng.random_range(0.0..1.0) < intensity * 0.8;
    let casing = rng.random_range(0.0..1.0) < intensity * 0.5;
    let structure = rng.random_range(0.0..1.0) < intensity * 0.9;

    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}", seed, created_at.timestamp_nanos_opt().unwrap_or_default()));
    let run_id = hex::encode(hasher.finalize())[..12].to_string();

    EntropyProfile {
        seed,
        level,
        ordering,
        delimiters,
        spacing,
        casing,
        structure,
        run_id,
        created_at,
    }
}

fn truncate_digest(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
