//! Command-line interface definitions

/// Subcommands and their flags
pub mod commands;

pub use commands::{
    Action, BenchmarkOptions, Commands, ConfigOptions, MasterOptions, SolveOptions, WorkerOptions,
};
