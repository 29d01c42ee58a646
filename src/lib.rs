//! PoW Cluster - distributed proof-of-work search over HTTP
//!
//! A master fans a `(prefix, difficulty)` search out to a pool of workers.
//! Each worker runs generator/hasher pipelines until some candidate's
//! SHA-256 digest has the required number of leading zero bits; the first
//! solution reported wins and the master cancels everyone else.
//!
//! - Local search engine with bounded block queues and broadcast cancellation
//! - Worker and master HTTP coordinators
//! - Health polling with sticky dead state
//! - Local solve and benchmark tools

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Local search engine: candidate generation, pipelines, scheduling
pub mod miner;

/// HTTP clients for worker and master endpoints
pub mod network;

/// Worker and master coordinators and the worker registry
pub mod coordinator;

/// Hash counting and periodic reporting
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use coordinator::{MasterCoordinator, WorkerCoordinator, WorkerRegistry};
pub use miner::{CancelToken, Scheduler};
pub use network::{MasterClient, WorkerClient};
pub use stats::{HashCounter, MiningStats, StatsReporter};
pub use types::{SearchTarget, Solution};
pub use utils::{PowError, init_logging};
