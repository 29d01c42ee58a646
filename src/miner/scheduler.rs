// src/miner/scheduler.rs
//! Search scheduler
//!
//! Runs several [`Pipeline`] instances side by side on scoped OS threads.
//! Instances share only the cancellation token and a [`SolutionSlot`];
//! the first hasher to publish wins and every later publish is dropped.

use crate::config::SearchConfig;
use crate::miner::cancel::CancelToken;
use crate::miner::hash::seed_from_clock;
use crate::miner::pipeline::Pipeline;
use crate::miner::worker::SearchContext;
use crate::stats::HashCounter;
use crate::types::{SearchTarget, Solution};
use std::sync::OnceLock;
use std::time::Instant;

/// Holds at most one solution; writers never block
#[derive(Debug, Default)]
pub struct SolutionSlot {
    solution: OnceLock<Vec<u8>>,
}

impl SolutionSlot {
    /// Creates an empty slot
    pub fn new() -> Self {
        SolutionSlot {
            solution: OnceLock::new(),
        }
    }

    /// Stores `candidate` if the slot is still empty
    ///
    /// Returns true for the single winning call.
    pub fn publish(&self, candidate: &[u8]) -> bool {
        self.solution.get().is_none() && self.solution.set(candidate.to_vec()).is_ok()
    }

    /// The published candidate, if any
    pub fn get(&self) -> Option<&[u8]> {
        self.solution.get().map(Vec::as_slice)
    }

    /// Consumes the slot
    pub fn into_solution(self) -> Option<Solution> {
        self.solution
            .into_inner()
            .map(|c| Solution::from_candidate(&c))
    }
}

/// Coordinates pipeline instances for one worker process
#[derive(Clone, Debug)]
pub struct Scheduler {
    /// Number of pipeline instances per search
    pipelines: usize,
    /// Hasher stages per instance
    hashers: usize,
    /// Candidates per block
    block_size: usize,
    /// Mutable bytes after the prefix
    suffix_len: usize,
    /// Counter every hasher reports into
    hashes: HashCounter,
}

impl Scheduler {
    /// Creates a scheduler sized from `config`
    ///
    /// A pipeline count of zero means one instance per `1 + hashers`
    /// logical CPUs, at least one.
    pub fn new(config: &SearchConfig, hashes: HashCounter) -> Self {
        let hashers = config.hashers_per_pipeline.max(1);
        let pipelines = if config.pipelines == 0 {
            (num_cpus::get() / (1 + hashers)).max(1)
        } else {
            config.pipelines
        };

        Scheduler {
            pipelines,
            hashers,
            block_size: config.block_size.max(1),
            suffix_len: config.suffix_len,
            hashes,
        }
    }

    /// Number of pipeline instances started per search
    pub fn pipelines(&self) -> usize {
        self.pipelines
    }

    /// Hasher stages per pipeline instance
    pub fn hashers(&self) -> usize {
        self.hashers
    }

    /// Shared hash counter
    pub fn hashes(&self) -> &HashCounter {
        &self.hashes
    }

    /// Searches for a candidate meeting `target`, blocking the caller
    ///
    /// Returns `None` if `token` is cancelled before any candidate
    /// qualifies. Every stage thread has exited by the time this returns.
    pub fn search(&self, target: &SearchTarget, token: &CancelToken) -> Option<Solution> {
        let ctx = SearchContext::new(token.clone(), self.hashes.clone());
        let started = Instant::now();
        let hashes_before = self.hashes.get();

        log::debug!(
            "Starting search {} with {} pipeline(s) x {} hasher(s)",
            target,
            self.pipelines,
            self.hashers
        );

        let winners = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.pipelines)
                .flat_map(|index| {
                    Pipeline::new(
                        index,
                        target,
                        self.hashers,
                        self.block_size,
                        self.suffix_len,
                        seed_from_clock(index),
                    )
                    .spawn(scope, &ctx)
                })
                .collect();

            let mut winners = 0;
            for handle in handles {
                match handle.join() {
                    Ok(true) => winners += 1,
                    Ok(false) => {}
                    Err(_) => log::error!("A search stage panicked"),
                }
            }
            winners
        });

        let solution = ctx.slot.into_solution();
        if winners > 1 {
            log::error!("{} stages claimed the solution slot", winners);
        }
        log::debug!(
            "Search {} finished in {:.3}s after {} hashes (found: {})",
            target,
            started.elapsed().as_secs_f64(),
            self.hashes.get().saturating_sub(hashes_before),
            solution.is_some()
        );
        solution
    }
}
