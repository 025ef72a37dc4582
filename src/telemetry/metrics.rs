//! `metrics` facade recording for batch runs.
//!
//! Nothing is exported unless the host process installs a recorder.

use std::time::Duration;

use crate::pool::OutcomeKind;

pub const RUNS_TOTAL: &str = "batchpool_runs_total";
pub const OUTCOMES_TOTAL: &str = "batchpool_outcomes_total";
pub const ITEM_DURATION_SECONDS: &str = "batchpool_item_duration_seconds";
pub const ABORTS_TOTAL: &str = "batchpool_aborts_total";

/// Describe all metrics once so exporters can attach help text.
pub fn init_metrics() {
    metrics::describe_counter!(RUNS_TOTAL, "Batch runs started");
    metrics::describe_counter!(OUTCOMES_TOTAL, "Outcomes delivered, by kind");
    metrics::describe_histogram!(
        ITEM_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall time spent inside the operation per item"
    );
    metrics::describe_counter!(ABORTS_TOTAL, "Runs cancelled by abort-on-first-error");
}

pub fn record_run_started() {
    metrics::counter!(RUNS_TOTAL).increment(1);
}

pub fn record_outcome(kind: OutcomeKind) {
    metrics::counter!(OUTCOMES_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_item_duration(elapsed: Duration) {
    metrics::histogram!(ITEM_DURATION_SECONDS).record(elapsed.as_secs_f64());
}

pub fn record_abort() {
    metrics::counter!(ABORTS_TOTAL).increment(1);
}
