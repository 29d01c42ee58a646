//! Statistics collection and reporting module
//!
//! Tracks how many candidates the local pipelines have hashed and how
//! searches ended, and periodically logs the hashrate together with host
//! CPU usage.

/// Hash counter and periodic reporter
pub mod reporter;

// Re-export main components
pub use reporter::{HashCounter, MiningStats, StatsReporter};
