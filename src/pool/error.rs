//! Item-level error types for batch runs.
//!
//! Every condition an item can end in is recovered into an [`ItemError`];
//! nothing escapes a run as a caller-visible panic or separate error path.

use std::time::Duration;
use thiserror::Error;

/// Why an item did not produce a value.
///
/// `E` is the error type returned by the caller's operation; it is carried
/// verbatim in [`ItemError::Failed`].
#[derive(Debug, Clone, Error)]
pub enum ItemError<E> {
    /// The item was never handed to the operation: the parent signal was
    /// already cancelled, the batch deadline passed, or an earlier failure
    /// aborted the run.
    #[error("item not processed (cancelled or skipped)")]
    Skipped,

    #[error("duplicate item id detected: {0} (all items rejected)")]
    DuplicateId(String),

    #[error("panic: {0}")]
    Panicked(String),

    #[error("item timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("admission gate closed")]
    GateClosed,

    #[error("{0}")]
    Failed(E),
}

impl<E> ItemError<E> {
    /// Coarse classification used by stats and metrics.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Skipped | Self::GateClosed => OutcomeKind::Skipped,
            Self::DuplicateId(_) => OutcomeKind::Rejected,
            Self::Panicked(_) => OutcomeKind::Panicked,
            Self::TimedOut(_) => OutcomeKind::TimedOut,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }

    /// Returns true for failures that come from running the operation.
    /// These are the ones that trigger abort-on-first-error.
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Panicked(_) | Self::TimedOut(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Success,
    Failed,
    TimedOut,
    Panicked,
    Skipped,
    Rejected,
}

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 6] = [
        Self::Success,
        Self::Failed,
        Self::TimedOut,
        Self::Panicked,
        Self::Skipped,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Panicked => "panicked",
            Self::Skipped => "skipped",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_failures_are_classified() {
        assert!(ItemError::<String>::Failed("boom".into()).is_execution_failure());
        assert!(ItemError::<String>::Panicked("boom".into()).is_execution_failure());
        assert!(ItemError::<String>::TimedOut(Duration::from_secs(1)).is_execution_failure());
        assert!(!ItemError::<String>::Skipped.is_execution_failure());
        assert!(!ItemError::<String>::DuplicateId("1".into()).is_execution_failure());
    }

    #[test]
    fn display_messages() {
        let err: ItemError<String> = ItemError::DuplicateId("7".into());
        assert_eq!(err.to_string(), "duplicate item id detected: 7 (all items rejected)");

        let err: ItemError<String> = ItemError::TimedOut(Duration::from_millis(250));
        assert_eq!(err.to_string(), "item timed out after 250ms");

        let err: ItemError<String> = ItemError::Failed("bad row".into());
        assert_eq!(err.to_string(), "bad row");
    }

    #[test]
    fn gate_closed_counts_as_skip() {
        assert_eq!(ItemError::<()>::GateClosed.kind(), OutcomeKind::Skipped);
        assert_eq!(ItemError::<()>::DuplicateId("x".into()).kind(), OutcomeKind::Rejected);
    }
}
