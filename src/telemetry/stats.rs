//! Lock-free per-run statistics.
//!
//! Complements the `metrics` facade: the facade feeds whatever exporter the
//! host process installed, while these values belong to one run and can be
//! read back by the caller through the outcome stream.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::pool::OutcomeKind;

/// Point-in-time view of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub invoked: u64,
    pub delivered: u64,
    pub dropped_duplicates: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub panicked: u64,
    pub skipped: u64,
    pub rejected: u64,
    pub latency: HistogramSummary,
}

impl StatsSnapshot {
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Success => self.succeeded,
            OutcomeKind::Failed => self.failed,
            OutcomeKind::TimedOut => self.timed_out,
            OutcomeKind::Panicked => self.panicked,
            OutcomeKind::Skipped => self.skipped,
            OutcomeKind::Rejected => self.rejected,
        }
    }
}

/// Summary statistics for item latency, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl HistogramSummary {
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Histogram with f64 bits stored in atomics.
struct HistogramData {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl HistogramData {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(f64::to_bits(0.0)),
            min: AtomicU64::new(f64::to_bits(f64::MAX)),
            max: AtomicU64::new(f64::to_bits(f64::MIN)),
        }
    }

    fn record(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        update_f64(&self.sum, |current| Some(current + value));
        update_f64(&self.min, |current| (value < current).then_some(value));
        update_f64(&self.max, |current| (value > current).then_some(value));
    }

    fn to_summary(&self) -> HistogramSummary {
        let count = self.count.load(Ordering::Relaxed);
        let sum = f64::from_bits(self.sum.load(Ordering::Relaxed));
        let min = f64::from_bits(self.min.load(Ordering::Relaxed));
        let max = f64::from_bits(self.max.load(Ordering::Relaxed));

        HistogramSummary {
            count,
            sum,
            min: if count == 0 { 0.0 } else { min },
            max: if count == 0 { 0.0 } else { max },
        }
    }
}

/// CAS loop over an f64 stored as bits. `f` returns `None` to leave it.
fn update_f64(atomic: &AtomicU64, f: impl Fn(f64) -> Option<f64>) {
    let _ = atomic.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
        f(f64::from_bits(bits)).map(f64::to_bits)
    });
}

/// Counters for one run. Shared between workers, feeder and the stream.
pub struct RunStats {
    submitted: AtomicU64,
    invoked: AtomicU64,
    dropped_duplicates: AtomicU64,
    outcomes: [AtomicU64; 6],
    latency: HistogramData,
}

impl RunStats {
    pub fn new(submitted: usize) -> Self {
        Self {
            submitted: AtomicU64::new(submitted as u64),
            invoked: AtomicU64::new(0),
            dropped_duplicates: AtomicU64::new(0),
            outcomes: Default::default(),
            latency: HistogramData::new(),
        }
    }

    /// The operation was called for an item.
    pub fn record_invoked(&self) {
        self.invoked.fetch_add(1, Ordering::Relaxed);
    }

    /// An outcome reached the output stream.
    pub fn record_outcome(&self, kind: OutcomeKind) {
        self.outcomes[slot(kind)].fetch_add(1, Ordering::Relaxed);
    }

    /// A second outcome for an already delivered id was discarded.
    pub fn record_duplicate_drop(&self) {
        self.dropped_duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, seconds: f64) {
        self.latency.record(seconds);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |kind| self.outcomes[slot(kind)].load(Ordering::Relaxed);
        let counts = OutcomeKind::ALL.map(get);
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            invoked: self.invoked.load(Ordering::Relaxed),
            delivered: counts.iter().sum(),
            dropped_duplicates: self.dropped_duplicates.load(Ordering::Relaxed),
            succeeded: get(OutcomeKind::Success),
            failed: get(OutcomeKind::Failed),
            timed_out: get(OutcomeKind::TimedOut),
            panicked: get(OutcomeKind::Panicked),
            skipped: get(OutcomeKind::Skipped),
            rejected: get(OutcomeKind::Rejected),
            latency: self.latency.to_summary(),
        }
    }
}

impl std::fmt::Debug for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStats").field("snapshot", &self.snapshot()).finish()
    }
}

fn slot(kind: OutcomeKind) -> usize {
    match kind {
        OutcomeKind::Success => 0,
        OutcomeKind::Failed => 1,
        OutcomeKind::TimedOut => 2,
        OutcomeKind::Panicked => 3,
        OutcomeKind::Skipped => 4,
        OutcomeKind::Rejected => 5,
    }
}
