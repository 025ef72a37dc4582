//! Execution context handed to the caller's operation.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in for "no deadline" when `start + timeout` leaves the clock's range.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + timeout`, capped at a far-future instant so huge timeouts such
/// as `Duration::MAX` do not overflow.
pub(crate) fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start + timeout.min(FAR_FUTURE)
}

/// Cancellation and deadline view for a single item.
///
/// The token is a child of the batch signal, so parent cancellation, the
/// batch deadline and abort-on-first-error all show up here. Operations
/// should watch [`ItemContext::cancelled`] and return promptly; the
/// deadline itself is enforced by the worker regardless.
#[derive(Debug, Clone)]
pub struct ItemContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ItemContext {
    pub(crate) fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Resolves once the item should stop: batch cancelled or deadline hit.
    pub async fn cancelled(&self) {
        tokio::select! {
            () = self.token.cancelled() => {}
            () = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the item deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// The underlying token, for handing to APIs that take one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}
