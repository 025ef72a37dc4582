// Copyright 2024-2026 batchpool Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for batchpool commands.
//!
//! ## Usage
//!
//! ```bash
//! batchpool-cli run --items 500 --workers 8 --fail-rate 0.05
//! batchpool-cli config show      # Effective configuration
//! batchpool-cli config validate  # Check env overrides
//! ```

pub mod config_cmd;
pub mod run_cmd;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use run_cmd::{run_synthetic, RunArgs};

/// Argument errors shared by all subcommands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing value for {0}")]
    MissingValue(String),
    #[error("Invalid value for {flag}: {value}")]
    InvalidValue { flag: String, value: String },
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// Cancel `token` on the first ctrl-c. The returned task ends with the
/// token, whichever comes first.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {}
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => tracing::warn!("interrupt received, cancelling run"),
                    Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
                }
                token.cancel();
            }
        }
    })
}

/// Wait for a background CLI task, logging instead of propagating a
/// panic or cancellation.
pub async fn join_background(name: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        tracing::error!(task = name, error = %e, "background task failed");
    }
}
