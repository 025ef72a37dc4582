//! Telemetry for batch runs.
//!
//! Provides structured logging, run spans, `metrics` facade recording and
//! per-run statistics.

mod logging;
mod metrics;
mod spans;
mod stats;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    init_metrics, record_abort, record_item_duration, record_outcome, record_run_started,
    ABORTS_TOTAL, ITEM_DURATION_SECONDS, OUTCOMES_TOTAL, RUNS_TOTAL,
};
pub use spans::{RunSpan, SpanExt};
pub use stats::{HistogramSummary, RunStats, StatsSnapshot};
