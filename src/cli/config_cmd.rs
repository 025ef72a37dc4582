// Copyright 2024-2026 batchpool Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration from environment variables (and an
//! optional TOML file) without running anything.

use std::path::Path;

use crate::config::{self, BatchConfig, ResolvedConfig};

/// Print effective config as key-value pairs to stdout.
pub fn run_show(config_file: Option<&Path>) -> i32 {
    match load(config_file) {
        Ok(raw) => {
            print_config(&raw.resolve());
            0
        }
        Err(code) => code,
    }
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    print_config(&ResolvedConfig::default());
}

/// Validate configuration for values that will be silently adjusted or
/// ignored.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the file is unreadable.
pub fn run_validate(config_file: Option<&Path>) -> i32 {
    let raw = match load(config_file) {
        Ok(raw) => raw,
        Err(code) => return code,
    };
    let warnings = validate(&raw);
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

/// Collect human-readable warnings for `raw` plus the current environment.
pub fn validate(raw: &BatchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for key in [
        config::ENV_WORKERS,
        config::ENV_ITEM_TIMEOUT_MS,
        config::ENV_BATCH_TIMEOUT_MS,
    ] {
        if let Ok(value) = std::env::var(key) {
            if value.trim().parse::<u64>().is_err() {
                warnings.push(format!("{} ({}) is not a number; using default", key, value));
            }
        }
    }
    if let Ok(value) = std::env::var(config::ENV_ABORT_ON_ERROR) {
        let known = ["1", "0", "true", "false", "yes", "no", "on", "off"];
        if !known.contains(&value.trim().to_ascii_lowercase().as_str()) {
            warnings.push(format!(
                "{} ({}) is not a boolean; using default",
                config::ENV_ABORT_ON_ERROR,
                value
            ));
        }
    }

    let resolved = raw.resolve();
    if !raw.batch_timeout.is_zero() && resolved.batch_timeout != raw.batch_timeout {
        warnings.push(format!(
            "{} ({}) is below the item timeout; raised to {}",
            config::ENV_BATCH_TIMEOUT_MS,
            raw.batch_timeout.as_millis(),
            resolved.batch_timeout.as_millis()
        ));
    }

    warnings
}

fn load(config_file: Option<&Path>) -> Result<BatchConfig, i32> {
    let base = match config_file {
        Some(path) => config::load_file(path).map_err(|e| {
            eprintln!("Configuration error: {}", e);
            2
        })?,
        None => BatchConfig::default(),
    };
    Ok(config::overlay_env(base))
}

fn print_config(cfg: &ResolvedConfig) {
    for (key, value) in cfg.effective() {
        println!("{}={}", key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_LOCK;
    use std::time::Duration;

    const ENV_KEYS: &[&str] = &[
        config::ENV_WORKERS,
        config::ENV_ITEM_TIMEOUT_MS,
        config::ENV_BATCH_TIMEOUT_MS,
        config::ENV_ABORT_ON_ERROR,
    ];

    fn clear_env() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_validate_passes_with_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(validate(&BatchConfig::default()).is_empty());
        assert_eq!(run_validate(None), 0);
    }

    #[test]
    fn test_validate_flags_unparseable_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var(config::ENV_WORKERS, "eight");
        std::env::set_var(config::ENV_ABORT_ON_ERROR, "sometimes");
        let warnings = validate(&BatchConfig::default());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("BATCHPOOL_WORKERS"));
        clear_env();
    }

    #[test]
    fn test_validate_flags_raised_batch_timeout() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let raw = BatchConfig::default()
            .with_item_timeout(Duration::from_secs(10))
            .with_batch_timeout(Duration::from_secs(5));
        let warnings = validate(&raw);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("raised to 20000"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let code = run_show(Some(Path::new("/nonexistent/batchpool.toml")));
        assert_eq!(code, 2);
    }

    #[test]
    fn test_defaults_smoke() {
        run_defaults();
    }
}
