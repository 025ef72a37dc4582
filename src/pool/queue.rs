//! Hand-off queue between the feeder and the executors.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::item::WorkItem;

/// Slots buffered between feeder and executors. Kept at one so the feeder
/// stays at most one item ahead of the pool.
const HANDOFF_CAPACITY: usize = 1;

/// Create a bounded single-producer, multi-consumer hand-off queue.
pub(crate) fn dispatch_queue<K, T>() -> (DispatchSender<K, T>, DispatchReceiver<K, T>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    (
        DispatchSender { tx },
        DispatchReceiver { rx: Arc::new(Mutex::new(rx)) },
    )
}

/// Feeder side. Dropping it closes the queue.
pub(crate) struct DispatchSender<K, T> {
    tx: mpsc::Sender<WorkItem<K, T>>,
}

impl<K, T> DispatchSender<K, T> {
    /// Wait for room and push the item. Cancel-safe: dropping the future
    /// before it resolves leaves the queue untouched.
    pub async fn offer(&self, item: WorkItem<K, T>) -> Result<(), WorkItem<K, T>> {
        self.tx.send(item).await.map_err(|e| e.0)
    }
}

/// Executor side, shared by all workers of one run.
pub(crate) struct DispatchReceiver<K, T> {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem<K, T>>>>,
}

impl<K, T> Clone for DispatchReceiver<K, T> {
    fn clone(&self) -> Self {
        Self { rx: Arc::clone(&self.rx) }
    }
}

impl<K, T> DispatchReceiver<K, T> {
    /// Next item, or `None` once the feeder is done and the queue drained.
    pub async fn next(&self) -> Option<WorkItem<K, T>> {
        self.rx.lock().await.recv().await
    }
}
