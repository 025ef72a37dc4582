//! Span utilities for batch runs.
//!
//! Provides standardized span creation and result recording.

use tracing::{info_span, Span};

use crate::telemetry::StatsSnapshot;

/// Extension trait for adding run results to spans.
pub trait SpanExt {
    /// Record the final counters of a run into the span.
    fn record_stats(&self, stats: &StatsSnapshot);
}

impl SpanExt for Span {
    fn record_stats(&self, stats: &StatsSnapshot) {
        self.record("succeeded", stats.succeeded);
        self.record("failed", stats.failed + stats.timed_out + stats.panicked);
        self.record("skipped", stats.skipped);
    }
}

/// Factory for creating standardized run spans.
pub struct RunSpan;

impl RunSpan {
    /// Create a new run span.
    ///
    /// Fields included:
    /// - `run_id`: Unique identifier for the run
    /// - `items`: Number of submitted items
    /// - `workers`: Resolved worker count
    /// - `succeeded` / `failed` / `skipped`: Filled in by `SpanExt::record_stats`
    pub fn new(run_id: &str, items: usize, workers: usize) -> Span {
        info_span!(
            "batch_run",
            run_id = %run_id,
            items = items,
            workers = workers,
            succeeded = tracing::field::Empty,
            failed = tracing::field::Empty,
            skipped = tracing::field::Empty,
        )
    }
}
