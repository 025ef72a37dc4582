//! batchpool
//!
//! Bounded-concurrency batch execution: run a set of independent items
//! through an async operation on a fixed number of executors, with a
//! per-item deadline, a whole-batch deadline, an optional shared admission
//! gate, optional abort on first failure, and panic containment.
//!
//! # Guarantees
//!
//! - One [`Outcome`] per submitted item, correlated by id, in completion
//!   order (not submission order).
//! - The outcome stream closes exactly once, after the last outcome.
//! - Failures inside the operation, panics included, never escape a run.
//! - Items not yet started when the batch is cancelled are never started.
//!
//! # Example
//!
//! ```no_run
//! use batchpool::{run, BatchConfig, ItemContext, WorkItem};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let items = (0..100u32).map(|i| WorkItem::new(i, i)).collect();
//! let config = BatchConfig::default().with_workers(8);
//! let stream = run(
//!     &CancellationToken::new(),
//!     items,
//!     |_ctx: ItemContext, n: u32| async move { Ok::<_, String>(n * n) },
//!     None,
//!     config,
//! );
//! for outcome in stream.collect_all().await {
//!     println!("{:?} -> {:?}", outcome.id, outcome.result);
//! }
//! # }
//! ```
//!
//! # Known race
//!
//! Delivery is first-writer-wins per id. When cancellation races a
//! completing item, the caller may observe `Skipped` for an item whose
//! operation finished a moment later; that late result is dropped.

pub mod cli;
pub mod config;
pub mod pool;
pub mod telemetry;

pub use config::{BatchConfig, ConfigError, ResolvedConfig};
pub use pool::{
    run, AdmissionGate, BatchRunner, GatePermit, ItemContext, ItemError, Operation, Outcome,
    OutcomeKind, OutcomeStream, WorkItem,
};
pub use telemetry::StatsSnapshot;
