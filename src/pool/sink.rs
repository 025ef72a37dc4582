//! Exactly-once delivery of outcomes, keyed by item id.
//!
//! A skip and a genuine completion can race for the same id (the feeder
//! or a worker sees cancellation while another path finishes). The first
//! writer wins and later attempts are dropped. A caller may therefore see
//! `Skipped` for an item whose operation did complete a moment later; that
//! result is discarded.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::mpsc;

use super::item::Outcome;
use crate::telemetry::{self, RunStats};

/// Multi-producer front of the output stream.
pub(crate) struct ResultSink<K, R, E> {
    delivered: DashSet<K>,
    tx: mpsc::Sender<Outcome<K, R, E>>,
    stats: Arc<RunStats>,
}

impl<K, R, E> ResultSink<K, R, E>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// `tx` must have room for one outcome per submitted item.
    pub fn new(tx: mpsc::Sender<Outcome<K, R, E>>, stats: Arc<RunStats>) -> Self {
        Self {
            delivered: DashSet::new(),
            tx,
            stats,
        }
    }

    /// Forward `outcome` unless one was already delivered for its id.
    /// Returns true if this call delivered it.
    pub fn deliver(&self, outcome: Outcome<K, R, E>) -> bool {
        if !self.delivered.insert(outcome.id.clone()) {
            tracing::trace!(id = ?outcome.id, kind = %outcome.kind(), "dropping late outcome");
            self.stats.record_duplicate_drop();
            return false;
        }

        let kind = outcome.kind();
        self.stats.record_outcome(kind);
        telemetry::record_outcome(kind);

        // Capacity equals the batch size and each id passes the set once,
        // so the channel can only refuse when the caller dropped the stream.
        if let Err(err) = self.tx.try_send(outcome) {
            tracing::debug!(error = %err, "outcome stream no longer read");
        }
        true
    }

    /// Convenience for the skip path.
    pub fn skip(&self, id: K) -> bool {
        self.deliver(Outcome::skipped(id))
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}
