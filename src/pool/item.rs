//! Identifier-correlated input and output records.

use super::error::{ItemError, OutcomeKind};

/// One unit of work. `id` must be unique within a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<K, T> {
    pub id: K,
    pub payload: T,
}

impl<K, T> WorkItem<K, T> {
    pub fn new(id: K, payload: T) -> Self {
        Self { id, payload }
    }
}

/// Result for exactly one submitted item, matched by `id`.
#[derive(Debug, Clone)]
pub struct Outcome<K, R, E> {
    pub id: K,
    pub result: Result<R, ItemError<E>>,
}

impl<K, R, E> Outcome<K, R, E> {
    pub fn success(id: K, value: R) -> Self {
        Self { id, result: Ok(value) }
    }

    pub fn failure(id: K, error: ItemError<E>) -> Self {
        Self { id, result: Err(error) }
    }

    pub fn skipped(id: K) -> Self {
        Self::failure(id, ItemError::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.result, Err(ItemError::Skipped))
    }

    pub fn value(&self) -> Option<&R> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ItemError<E>> {
        self.result.as_ref().err()
    }

    pub fn kind(&self) -> OutcomeKind {
        match &self.result {
            Ok(_) => OutcomeKind::Success,
            Err(e) => e.kind(),
        }
    }
}
