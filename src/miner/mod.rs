// src/miner/mod.rs
//! Local proof-of-work search engine
//!
//! - Candidate generation and the difficulty test
//! - Broadcast cancellation
//! - Generator/hasher pipelines over bounded block queues
//! - The scheduler running several pipelines at once

/// Seed chain, suffix mutation and leading-zero digest test
pub mod hash;

/// Broadcast-once cancellation token
pub mod cancel;

/// Block pool and pipeline instance wiring
pub mod pipeline;

/// Generator and hasher stage loops
pub mod worker;

/// Runs pipeline instances and collects the first solution
pub mod scheduler;

// Re-export main components for cleaner imports
pub use self::cancel::CancelToken;
pub use self::pipeline::{Block, Pipeline};
pub use self::scheduler::{Scheduler, SolutionSlot};
pub use self::worker::SearchContext;
