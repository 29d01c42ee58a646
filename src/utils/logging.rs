// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! Sets up the `log` facade for the master, worker and local tools.
//! Uses `env_logger` under the hood with a compact custom format.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem for the long-running servers
///
/// # Configuration
/// - Logs to stdout
/// - Default log level: Info
/// - `RUST_LOG` overrides the default when set
pub fn init_logging() {
    init_with_default(LevelFilter::Info);
}

/// Configures logging for `solve` and `benchmark`
///
/// Same format as [`init_logging`] but defaults to Debug so per-thread
/// throughput lines are visible without setting `RUST_LOG`.
pub fn init_bench_logging() {
    init_with_default(LevelFilter::Debug);
}

fn init_with_default(level: LevelFilter) {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(level);
    } else {
        builder.parse_env("RUST_LOG");
    }

    // A second init (tests, embedded use) keeps the first logger.
    let _ = builder.try_init();
}

/// Creates a base logger builder with the shared format:
/// `[timestamp level module:line] message`, written to stdout.
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_millis();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
