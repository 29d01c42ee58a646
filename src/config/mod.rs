// src/config/mod.rs
//! Configuration management
//!
//! Settings live in an optional TOML file with `[search]`, `[worker]` and
//! `[master]` sections. Every value has a default and command-line flags
//! override whatever the file says.

/// Core configuration implementation
pub mod config;

// Re-export key items for easy access
pub use config::{Config, MasterConfig, SearchConfig, WorkerConfig};

use crate::utils::error::PowError;
use std::path::PathBuf;

/// Loads configuration from a TOML file, or defaults when no path is given
pub fn load(path: Option<impl Into<PathBuf>>) -> Result<Config, PowError> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::default()),
    }
}

/// Generates a commented configuration template
pub fn generate_template() -> String {
    Config::generate_template()
}
