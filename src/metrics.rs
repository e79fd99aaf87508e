//! Metric sinks: fire-and-forget observability events.
//!
//! Sinks never affect control flow — `record` is synchronous, infallible,
//! and free to drop events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// One observability event.
#[derive(Debug, Clone, Serialize)]
pub enum MetricEvent {
    /// A genome was scored by both judges.
    GenomeEvaluated {
        genome_id: String,
        generation: u32,
        score_a: f64,
        score_b: f64,
        fitness: f64,
        tags: Vec<String>,
        at: DateTime<Utc>,
    },

    /// A duel round completed.
    DuelRound {
        round: u32,
        variant_id: String,
        strict_score: f64,
        adjusted_strict: f64,
        lenient_score: Option<f64>,
        resolution: String,
        at: DateTime<Utc>,
    },
}

/// Destination for metric events.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricEvent);
}

/// Sink that drops everything; the default.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn record(&self, _event: MetricEvent) {}
}

/// Sink that keeps every event in memory; used by tests and short runs.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for RecordingSink {
    fn record(&self, event: MetricEvent) {
        self.events.lock().unwrap().push(event);
    }
}
