//! Executor loop: drain the dispatch queue and run the operation per item.
//!
//! Each item goes through the same steps: cancellation check, optional
//! gate acquisition, deadline derivation, contained invocation, gate
//! release, abort escalation, delivery.

use std::any::Any;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::context::{deadline_after, ItemContext};
use super::error::ItemError;
use super::gate::AdmissionGate;
use super::item::{Outcome, WorkItem};
use super::queue::DispatchReceiver;
use super::sink::ResultSink;
use crate::config::ResolvedConfig;
use crate::telemetry;

/// The caller's per-item work.
///
/// Implemented for every `Fn(ItemContext, T) -> impl Future<Output = Result<R, E>>`
/// closure; implement it directly for stateful operations.
pub trait Operation<T, R, E>: Send + Sync + 'static {
    type Future: Future<Output = Result<R, E>> + Send + 'static;

    fn call(&self, ctx: ItemContext, payload: T) -> Self::Future;
}

impl<F, Fut, T, R, E> Operation<T, R, E> for F
where
    F: Fn(ItemContext, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, ctx: ItemContext, payload: T) -> Fut {
        self(ctx, payload)
    }
}

/// State shared by the feeder, every worker and the finalizer of one run.
pub(crate) struct RunShared<K, R, E, Op> {
    pub batch: CancellationToken,
    pub batch_deadline: Instant,
    pub config: ResolvedConfig,
    pub gate: Option<AdmissionGate>,
    pub operation: Op,
    pub sink: ResultSink<K, R, E>,
}

impl<K, R, E, Op> RunShared<K, R, E, Op>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Batch signal fired, or its deadline passed before the watchdog ran.
    pub fn is_cancelled(&self) -> bool {
        self.batch.is_cancelled() || Instant::now() >= self.batch_deadline
    }

    fn abort(&self, id: &K, error: &ItemError<E>)
    where
        E: std::fmt::Display,
    {
        if !self.batch.is_cancelled() {
            tracing::warn!(id = ?id, error = %error, "aborting run after first failure");
            telemetry::record_abort();
        }
        self.batch.cancel();
    }
}

/// Run until the queue is closed and drained.
pub(crate) async fn worker_loop<K, T, R, E, Op>(
    index: usize,
    shared: Arc<RunShared<K, R, E, Op>>,
    queue: DispatchReceiver<K, T>,
) where
    K: Eq + Hash + Clone + std::fmt::Debug,
    E: std::fmt::Display,
    Op: Operation<T, R, E>,
{
    let mut handled = 0usize;
    while let Some(item) = queue.next().await {
        process_item(&shared, item).await;
        handled += 1;
    }
    tracing::trace!(worker = index, handled, "worker drained");
}

async fn process_item<K, T, R, E, Op>(shared: &RunShared<K, R, E, Op>, item: WorkItem<K, T>)
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    E: std::fmt::Display,
    Op: Operation<T, R, E>,
{
    let WorkItem { id, payload } = item;

    if shared.is_cancelled() {
        shared.sink.skip(id);
        return;
    }

    let permit = match &shared.gate {
        None => None,
        Some(gate) => tokio::select! {
            biased;
            () = shared.batch.cancelled() => {
                shared.sink.skip(id);
                return;
            }
            acquired = gate.acquire() => match acquired {
                Ok(permit) => Some(permit),
                Err(_) => {
                    shared.sink.deliver(Outcome::failure(id, ItemError::GateClosed));
                    return;
                }
            },
        },
    };

    let result = invoke(shared, payload).await;
    drop(permit);

    if let Err(error) = &result {
        if error.is_execution_failure() && shared.config.abort_on_first_error {
            shared.abort(&id, error);
        }
    }

    shared.sink.deliver(Outcome { id, result });
}

/// Call the operation under the item deadline with panics contained.
async fn invoke<K, T, R, E, Op>(
    shared: &RunShared<K, R, E, Op>,
    payload: T,
) -> Result<R, ItemError<E>>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    Op: Operation<T, R, E>,
{
    let started = Instant::now();
    let deadline = deadline_after(started, shared.config.item_timeout).min(shared.batch_deadline);
    let token = shared.batch.child_token();
    let ctx = ItemContext::new(token.clone(), deadline);

    shared.sink.stats().record_invoked();
    let operation = &shared.operation;
    let call = AssertUnwindSafe(async move { operation.call(ctx, payload).await }).catch_unwind();
    let finished = tokio::time::timeout_at(deadline, call).await;
    token.cancel();

    let elapsed = started.elapsed();
    shared.sink.stats().record_latency(elapsed.as_secs_f64());
    telemetry::record_item_duration(elapsed);

    match finished {
        Err(_) => Err(ItemError::TimedOut(deadline.saturating_duration_since(started))),
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(panic = %message, "operation panicked");
            Err(ItemError::Panicked(message))
        }
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(error))) => Err(ItemError::Failed(error)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
