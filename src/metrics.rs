//! Observability: latency histograms for the session's hot paths.
//! Histograms report p50/p95/p99 over a fixed window of recent samples.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::ring::FloatRing;

/// Measures elapsed time from creation to `finish`.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn new(name: &'static str, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            name,
            start: Instant::now(),
            registry,
        }
    }

    /// Record elapsed microseconds and return them.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Percentile `p` (0-100) over the ring's samples, 0 when empty.
fn percentile(ring: &FloatRing, p: f64) -> f64 {
    if ring.is_empty() {
        return 0.0;
    }
    let mut sorted = ring.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Named histograms, shared by the ingest path and the frame loop.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, FloatRing>>,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            ring_capacity: ring_capacity.max(1),
        }
    }

    /// Record a sample in microseconds.
    pub fn record(&self, name: &'static str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name)
            .or_insert_with(|| FloatRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan::new(name, Arc::clone(self))
    }

    /// Percentile `p` (0-100) for a metric, 0 when unrecorded.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        let hists = self.histograms.lock();
        hists.get(name).map_or(0.0, |ring| percentile(ring, p))
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        hists
            .iter()
            .map(|(&name, ring)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: percentile(ring, 50.0),
                        p95_us: percentile(ring, 95.0),
                        p99_us: percentile(ring, 99.0),
                        count: ring.len(),
                    },
                )
            })
            .collect()
    }

    pub fn clear(&self) {
        self.histograms.lock().clear();
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

pub mod metric_names {
    /// Append + metrics recompute for one recognized word.
    pub const INGEST_RECOMPUTE: &str = "ingest_recompute";
    /// Snapshot + prediction + integration + emission for one frame.
    pub const TICK_COMPUTE: &str = "tick_compute";
    /// Absolute difference between observed and configured frame spacing.
    pub const TICK_JITTER: &str = "tick_jitter";
}
