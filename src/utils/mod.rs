// src/utils/mod.rs
//! Utilities module for common functionality
//!
//! Error handling and logging infrastructure shared by the master,
//! the worker and the local command-line tools.

/// Error types and handling utilities
///
/// Contains the [`PowError`] enum which defines all possible error conditions
/// along with conversion implementations and HTTP status mapping.
pub mod error;

/// Logging configuration and utilities
pub mod logging;

// Re-export for easier access
pub use error::PowError;
pub use logging::{init_bench_logging, init_logging};
