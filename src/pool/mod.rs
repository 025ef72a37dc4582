//! Bounded-concurrency batch execution.
//!
//! A run wires one feeder, a fixed set of executors and a finalizer around
//! a shared batch-cancellation token:
//!
//! ```text
//! items -> feeder -> dispatch queue -> executors -> result sink -> OutcomeStream
//!                                        |  ^
//!                              admission gate (optional, caller-owned)
//! ```
//!
//! The batch token is a child of the caller's token and is also cancelled
//! by the batch deadline and, when enabled, by the first failing item.

mod context;
mod error;
mod feeder;
mod gate;
mod item;
mod queue;
mod runner;
mod sink;
mod stream;
mod worker;

pub use context::ItemContext;
pub use error::{ItemError, OutcomeKind};
pub use gate::{AdmissionGate, GatePermit};
pub use item::{Outcome, WorkItem};
pub use runner::{run, BatchRunner};
pub use stream::OutcomeStream;
pub use worker::Operation;
