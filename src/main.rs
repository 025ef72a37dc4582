//! batchpool CLI entry point.
//!
//! ## Subcommands
//!
//! - `batchpool-cli run [OPTIONS]` - Execute a synthetic batch
//! - `batchpool-cli config show|defaults|validate` - Inspect configuration
//! - `batchpool-cli version` / `help`

use std::path::PathBuf;
use std::process::ExitCode;

use batchpool::cli::config_cmd;
use batchpool::cli::{run_synthetic, RunArgs};
use batchpool::telemetry::{init_logging, init_metrics, LogConfig, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    let mut log_config = LogConfig::from_env();
    if std::env::var_os("BATCHPOOL_LOG_FORMAT").is_none() {
        log_config.format = LogFormat::Pretty;
    }
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Logging setup failed: {}", e);
    }
    init_metrics();

    match command {
        "run" => match RunArgs::parse(&args[2..]) {
            Ok(run_args) => ExitCode::from(run_synthetic(run_args).await as u8),
            Err(e) => {
                eprintln!("{}", e);
                print_command_help("run");
                ExitCode::from(2u8)
            }
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            let file = config_file_arg(&args[3.min(args.len())..]);
            match subcommand {
                "show" => ExitCode::from(config_cmd::run_show(file.as_deref()) as u8),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate(file.as_deref()) as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("batchpool {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn config_file_arg(rest: &[String]) -> Option<PathBuf> {
    match rest {
        [flag, path, ..] if flag == "--config" => Some(PathBuf::from(path)),
        _ => None,
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "batchpool - bounded-concurrency batch runner v{}

USAGE:
    batchpool-cli [COMMAND] [OPTIONS]

COMMANDS:
    run          Execute a synthetic batch and stream outcomes
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    BATCHPOOL_WORKERS           Concurrent executors (default: 2)
    BATCHPOOL_ITEM_TIMEOUT_MS   Per-item deadline (default: 15000)
    BATCHPOOL_BATCH_TIMEOUT_MS  Whole-batch deadline (default: 30000)
    BATCHPOOL_ABORT_ON_ERROR    Cancel the batch on first failure (default: false)
    BATCHPOOL_LOG               Log filter (default: info)
    BATCHPOOL_LOG_FORMAT        json or pretty

EXIT CODES:
    0  Success
    1  Some items did not succeed / validation warnings
    2  Configuration or usage error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "batchpool-cli run - Execute a synthetic batch

USAGE:
    batchpool-cli run [OPTIONS]

OPTIONS:
    --items N              Number of items (default: 100)
    --workers N|auto       Concurrent executors
    --item-timeout-ms MS   Per-item deadline
    --batch-timeout-ms MS  Whole-batch deadline
    --max-delay-ms MS      Upper bound of the random work time (default: 50)
    --fail-rate F          Fraction of items that fail (0.0-1.0)
    --panic-rate F         Fraction of items that panic (0.0-1.0)
    --gate N               Share an admission gate of N tokens
    --abort-on-error       Cancel the remaining batch on first failure
    --config FILE          Load [batch] settings from a TOML file
    --json                 One JSON object per outcome, then a summary

Ctrl-C cancels the run; items not yet started are reported as skipped.
"
            );
        }
        "config" => {
            eprintln!(
                "batchpool-cli config - Inspect configuration

USAGE:
    batchpool-cli config show [--config FILE]
    batchpool-cli config defaults
    batchpool-cli config validate [--config FILE]
"
            );
        }
        _ => print_usage(),
    }
}
