//! Feeder: hands validated items to the pool one at a time.

use std::hash::Hash;
use std::sync::Arc;

use super::item::WorkItem;
use super::queue::DispatchSender;
use super::worker::RunShared;

/// Offer every item to the queue. Once the batch is cancelled, the current
/// item and everything after it is skipped without blocking. Dropping
/// `queue` on return closes it for the workers.
pub(crate) async fn feed<K, T, R, E, Op>(
    shared: Arc<RunShared<K, R, E, Op>>,
    items: Vec<WorkItem<K, T>>,
    queue: DispatchSender<K, T>,
) where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    let mut pending = items.into_iter();
    let mut offered = 0usize;

    while let Some(item) = pending.next() {
        let id = item.id.clone();
        tokio::select! {
            biased;
            () = shared.batch.cancelled() => {
                let mut skipped = usize::from(shared.sink.skip(id));
                for rest in pending.by_ref() {
                    skipped += usize::from(shared.sink.skip(rest.id));
                }
                tracing::debug!(offered, skipped, "feeder stopped by cancellation");
                break;
            }
            sent = queue.offer(item) => match sent {
                Ok(()) => offered += 1,
                Err(item) => {
                    shared.sink.skip(item.id);
                }
            },
        }
    }
}
