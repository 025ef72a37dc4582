//! Batch configuration: resolution rules, environment and file loading.
//!
//! Any field may be left unset (zero). [`BatchConfig::resolve`] applies the
//! defaulting rules silently; nothing here ever fails a run.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `BATCHPOOL_WORKERS` | 2 | Concurrent executors per run |
//! | `BATCHPOOL_ITEM_TIMEOUT_MS` | 15000 | Deadline per item (ms) |
//! | `BATCHPOOL_BATCH_TIMEOUT_MS` | 30000 | Deadline for the whole run (ms) |
//! | `BATCHPOOL_ABORT_ON_ERROR` | false | Cancel the run on the first failure |

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_WORKERS: &str = "BATCHPOOL_WORKERS";
pub const ENV_ITEM_TIMEOUT_MS: &str = "BATCHPOOL_ITEM_TIMEOUT_MS";
pub const ENV_BATCH_TIMEOUT_MS: &str = "BATCHPOOL_BATCH_TIMEOUT_MS";
pub const ENV_ABORT_ON_ERROR: &str = "BATCHPOOL_ABORT_ON_ERROR";

/// Raw tunables as supplied by the caller. Zero means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub workers: usize,
    #[serde(rename = "item_timeout_ms", with = "millis")]
    pub item_timeout: Duration,
    #[serde(rename = "batch_timeout_ms", with = "millis")]
    pub batch_timeout: Duration,
    pub abort_on_first_error: bool,
}

/// Tunables after defaulting. Always `workers >= 1`,
/// `item_timeout <= batch_timeout`, both durations non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub workers: usize,
    pub item_timeout: Duration,
    pub batch_timeout: Duration,
    pub abort_on_first_error: bool,
}

impl BatchConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_abort_on_first_error(mut self, abort: bool) -> Self {
        self.abort_on_first_error = abort;
        self
    }

    /// Apply the defaulting rules in order:
    /// 1. no workers → 2
    /// 2. no batch timeout → 30s
    /// 3. no item timeout → 15s, capped at the batch timeout
    /// 4. batch timeout below item timeout → twice the item timeout
    pub fn resolve(&self) -> ResolvedConfig {
        let workers = if self.workers == 0 { DEFAULT_WORKERS } else { self.workers };

        let mut batch_timeout = self.batch_timeout;
        if batch_timeout.is_zero() {
            batch_timeout = DEFAULT_BATCH_TIMEOUT;
        }

        let mut item_timeout = self.item_timeout;
        if item_timeout.is_zero() {
            item_timeout = DEFAULT_ITEM_TIMEOUT.min(batch_timeout);
        }

        if batch_timeout < item_timeout {
            batch_timeout = item_timeout.saturating_mul(2);
        }

        ResolvedConfig {
            workers,
            item_timeout,
            batch_timeout,
            abort_on_first_error: self.abort_on_first_error,
        }
    }
}

impl ResolvedConfig {
    /// Printable `KEY=value` summary of the effective values.
    pub fn effective(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_WORKERS, self.workers.to_string()),
            (ENV_ITEM_TIMEOUT_MS, self.item_timeout.as_millis().to_string()),
            (ENV_BATCH_TIMEOUT_MS, self.batch_timeout.as_millis().to_string()),
            (ENV_ABORT_ON_ERROR, self.abort_on_first_error.to_string()),
        ]
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        BatchConfig::default().resolve()
    }
}

/// Errors from reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    batch: BatchConfig,
}

/// Parse the `[batch]` table of a TOML document. A missing table yields
/// an all-default config.
///
/// ```toml
/// [batch]
/// workers = 8
/// item_timeout_ms = 2000
/// batch_timeout_ms = 60000
/// abort_on_first_error = true
/// ```
pub fn from_toml_str(text: &str) -> Result<BatchConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(text)?;
    Ok(file.batch)
}

/// Read and parse a TOML config file.
pub fn load_file(path: &Path) -> Result<BatchConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    from_toml_str(&text)
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a millisecond env var, returning `default` on missing or invalid.
fn parse_millis(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Whole milliseconds of `d`, saturating at `u64::MAX`.
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Load raw configuration from environment variables.
///
/// Missing or invalid values stay unset and resolve to the defaults.
pub fn load() -> BatchConfig {
    overlay_env(BatchConfig::default())
}

/// Apply environment overrides on top of `base` (e.g. a loaded file).
pub fn overlay_env(base: BatchConfig) -> BatchConfig {
    BatchConfig {
        workers: parse_usize(ENV_WORKERS, base.workers),
        item_timeout: parse_millis(ENV_ITEM_TIMEOUT_MS, base.item_timeout),
        batch_timeout: parse_millis(ENV_BATCH_TIMEOUT_MS, base.batch_timeout),
        abort_on_first_error: parse_bool(ENV_ABORT_ON_ERROR, base.abort_on_first_error),
    }
}

/// Serializes tests that mutate `BATCHPOOL_*` environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
