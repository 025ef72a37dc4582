//! Output stream returned by a run.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::item::Outcome;
use crate::telemetry::{RunStats, StatsSnapshot};

/// Outcomes in completion order. Ends once every submitted item has been
/// accounted for and all run tasks have exited.
pub struct OutcomeStream<K, R, E> {
    rx: mpsc::Receiver<Outcome<K, R, E>>,
    stats: Arc<RunStats>,
}

impl<K, R, E> OutcomeStream<K, R, E> {
    pub(crate) fn new(rx: mpsc::Receiver<Outcome<K, R, E>>, stats: Arc<RunStats>) -> Self {
        Self { rx, stats }
    }

    /// Stream with no outcomes that is already closed.
    pub(crate) fn closed() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self::new(rx, Arc::new(RunStats::new(0)))
    }

    /// Next outcome, or `None` once the run is finished.
    pub async fn recv(&mut self) -> Option<Outcome<K, R, E>> {
        self.rx.recv().await
    }

    /// Drain the stream to completion.
    pub async fn collect_all(mut self) -> Vec<Outcome<K, R, E>> {
        let mut outcomes = Vec::with_capacity(self.stats.snapshot().submitted as usize);
        while let Some(outcome) = self.rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Live counters for this run. Final once the stream has ended.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Shared handle to the counters, usable after the stream is consumed.
    pub fn stats_handle(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }
}

impl<K, R, E> Stream for OutcomeStream<K, R, E> {
    type Item = Outcome<K, R, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<K, R, E> std::fmt::Debug for OutcomeStream<K, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutcomeStream")
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn closed_stream_is_empty() {
        let mut stream = OutcomeStream::<u32, (), ()>::closed();
        assert!(stream.recv().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn yields_then_ends() {
        let (tx, rx) = mpsc::channel(2);
        let stream = OutcomeStream::<u32, u32, ()>::new(rx, Arc::new(RunStats::new(2)));
        tx.try_send(Outcome::success(1, 10)).unwrap();
        tx.try_send(Outcome::success(2, 20)).unwrap();
        drop(tx);

        let values: Vec<u32> = stream.map(|o| *o.value().unwrap()).collect().await;
        assert_eq!(values, vec![10, 20]);
    }
}
