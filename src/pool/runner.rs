//! Run entry point: pre-flight checks, task wiring and finalization.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::context::deadline_after;
use super::error::ItemError;
use super::feeder::feed;
use super::gate::AdmissionGate;
use super::item::{Outcome, WorkItem};
use super::queue::dispatch_queue;
use super::sink::ResultSink;
use super::stream::OutcomeStream;
use super::worker::{worker_loop, Operation, RunShared};
use crate::config::{self, BatchConfig};
use crate::telemetry::{self, RunSpan, RunStats, SpanExt};

/// Run `items` through `operation` with bounded concurrency.
///
/// Returns immediately; outcomes arrive on the stream in completion order,
/// exactly one per submitted item, and the stream ends once every task of
/// the run has exited.
///
/// Pre-flight, before any task is spawned:
/// - no items: the stream is already closed
/// - a repeated id: every item gets [`ItemError::DuplicateId`] and the
///   operation is never called
/// - `parent` already cancelled: every item gets [`ItemError::Skipped`]
///
/// Otherwise this must be called from within a tokio runtime.
pub fn run<K, T, R, E, Op>(
    parent: &CancellationToken,
    items: Vec<WorkItem<K, T>>,
    operation: Op,
    gate: Option<AdmissionGate>,
    config: BatchConfig,
) -> OutcomeStream<K, R, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
    T: Send + 'static,
    R: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    Op: Operation<T, R, E>,
{
    if items.is_empty() {
        return OutcomeStream::closed();
    }

    if let Some(duplicate) = first_duplicate(&items) {
        let reason = format!("{duplicate:?}");
        tracing::warn!(id = %reason, items = items.len(), "duplicate id, rejecting batch");
        return uniform(items, |_| ItemError::DuplicateId(reason.clone()));
    }

    if parent.is_cancelled() {
        tracing::debug!(items = items.len(), "parent already cancelled, skipping batch");
        return uniform(items, |_| ItemError::Skipped);
    }

    let config = config.resolve();
    let total = items.len();
    let workers = config.workers.min(total);
    let stats = Arc::new(RunStats::new(total));
    let (tx, rx) = mpsc::channel(total);

    let run_id = Uuid::new_v4().to_string();
    let span = RunSpan::new(&run_id, total, workers);
    telemetry::record_run_started();
    tracing::debug!(
        parent: &span,
        item_timeout_ms = config::millis(config.item_timeout),
        batch_timeout_ms = config::millis(config.batch_timeout),
        abort_on_first_error = config.abort_on_first_error,
        gated = gate.is_some(),
        "starting run"
    );

    let batch = parent.child_token();
    let batch_deadline = deadline_after(Instant::now(), config.batch_timeout);
    let shared = Arc::new(RunShared {
        batch: batch.clone(),
        batch_deadline,
        config,
        gate,
        operation,
        sink: ResultSink::new(tx, Arc::clone(&stats)),
    });

    tokio::spawn(watch_deadline(batch, batch_deadline).instrument(span.clone()));

    let (queue_tx, queue_rx) = dispatch_queue();
    let feeder = tokio::spawn(feed(Arc::clone(&shared), items, queue_tx).instrument(span.clone()));
    let executors = (0..workers)
        .map(|index| {
            let task = worker_loop(index, Arc::clone(&shared), queue_rx.clone());
            tokio::spawn(task.instrument(span.clone()))
        })
        .collect();
    drop(queue_rx);

    tokio::spawn(finalize(shared, feeder, executors).instrument(span));

    OutcomeStream::new(rx, stats)
}

/// Reusable run settings: configuration plus an optional shared gate.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    config: BatchConfig,
    gate: Option<AdmissionGate>,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config, gate: None }
    }

    pub fn with_gate(mut self, gate: AdmissionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn gate(&self) -> Option<&AdmissionGate> {
        self.gate.as_ref()
    }

    /// See [`run`].
    pub fn run<K, T, R, E, Op>(
        &self,
        parent: &CancellationToken,
        items: Vec<WorkItem<K, T>>,
        operation: Op,
    ) -> OutcomeStream<K, R, E>
    where
        K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
        T: Send + 'static,
        R: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        Op: Operation<T, R, E>,
    {
        run(parent, items, operation, self.gate.clone(), self.config.clone())
    }
}

fn first_duplicate<K: Eq + Hash, T>(items: &[WorkItem<K, T>]) -> Option<&K> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().map(|item| &item.id).find(|id| !seen.insert(*id))
}

/// Closed stream holding one identical failure per item. Ids are not
/// deduplicated here: a rejected batch reports every submitted entry.
fn uniform<K: Clone, T, R, E>(
    items: Vec<WorkItem<K, T>>,
    error: impl Fn(&K) -> ItemError<E>,
) -> OutcomeStream<K, R, E> {
    let stats = Arc::new(RunStats::new(items.len()));
    let (tx, rx) = mpsc::channel(items.len());
    for WorkItem { id, .. } in items {
        let outcome = Outcome::failure(id.clone(), error(&id));
        let kind = outcome.kind();
        if tx.try_send(outcome).is_ok() {
            stats.record_outcome(kind);
            telemetry::record_outcome(kind);
        }
    }
    OutcomeStream::new(rx, stats)
}

async fn watch_deadline(batch: CancellationToken, deadline: Instant) {
    tokio::select! {
        () = batch.cancelled() => {}
        () = tokio::time::sleep_until(deadline) => {
            tracing::debug!("batch deadline reached");
            batch.cancel();
        }
    }
}

/// Wait for the feeder, then every executor, then release the batch
/// signal. The stream closes when `shared` (holding the last sender) drops.
async fn finalize<K, R, E, Op>(
    shared: Arc<RunShared<K, R, E, Op>>,
    feeder: JoinHandle<()>,
    executors: Vec<JoinHandle<()>>,
) where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    if let Err(e) = feeder.await {
        tracing::error!(error = %e, "feeder task failed");
    }
    for result in futures::future::join_all(executors).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "executor task failed");
        }
    }
    shared.batch.cancel();

    let stats = shared.sink.stats().snapshot();
    tracing::Span::current().record_stats(&stats);
    tracing::info!(
        delivered = stats.delivered,
        succeeded = stats.succeeded,
        skipped = stats.skipped,
        "run finished"
    );
    drop(shared);
}
