// src/miner/pipeline.rs
//! One generator/hasher pipeline instance
//!
//! Each instance owns `2 * hashers` pre-allocated [`Block`]s that circulate
//! between two bounded queues:
//!
//! ```text
//!   unprocessed --> generator --> processed --> hasher x H --+
//!        ^                                                   |
//!        +---------------------------------------------------+
//! ```
//!
//! Blocks are moved by value, so a block is only ever reachable from the
//! queue or the stage currently holding it.

use crate::miner::worker::{self, SearchContext};
use crate::types::SearchTarget;
use crossbeam_channel::bounded;
use std::thread::{Scope, ScopedJoinHandle};

/// Fixed-size batch of candidates sharing one prefix
#[derive(Debug)]
pub struct Block {
    candidates: Vec<Vec<u8>>,
}

impl Block {
    /// Allocates `size` candidates of `prefix` followed by `suffix_len` bytes
    pub fn new(prefix: &[u8], suffix_len: usize, size: usize) -> Self {
        let mut template = Vec::with_capacity(prefix.len() + suffix_len);
        template.extend_from_slice(prefix);
        template.resize(prefix.len() + suffix_len, 0);
        Block {
            candidates: vec![template; size],
        }
    }

    /// Candidates in generation order
    pub fn candidates(&self) -> &[Vec<u8>] {
        &self.candidates
    }

    /// Mutable access for the generator stage
    pub fn candidates_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.candidates
    }

    /// Number of candidates in the block
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// True for a zero-sized block
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// A single generator plus its hashers, ready to be spawned
pub struct Pipeline {
    index: usize,
    prefix_len: usize,
    difficulty: u32,
    hashers: usize,
    seed: u64,
    blocks: Vec<Block>,
}

impl Pipeline {
    /// Builds an instance and pre-allocates its block pool
    ///
    /// # Arguments
    /// * `index` - Position among the sibling instances, used in thread names
    /// * `target` - Prefix and difficulty to search for
    /// * `hashers` - Number of hasher stages (at least one)
    /// * `block_size` - Candidates per block
    /// * `suffix_len` - Mutable bytes after the prefix
    /// * `seed` - Non-zero starting seed of the generator chain
    pub fn new(
        index: usize,
        target: &SearchTarget,
        hashers: usize,
        block_size: usize,
        suffix_len: usize,
        seed: u64,
    ) -> Self {
        let hashers = hashers.max(1);
        let prefix = target.prefix.as_bytes();
        let blocks = (0..2 * hashers)
            .map(|_| Block::new(prefix, suffix_len, block_size.max(1)))
            .collect();

        Pipeline {
            index,
            prefix_len: prefix.len(),
            difficulty: target.difficulty,
            hashers,
            seed,
            blocks,
        }
    }

    /// Number of blocks circulating in this instance
    pub fn pool_size(&self) -> usize {
        self.blocks.len()
    }

    /// Spawns the generator and hasher threads inside `scope`
    ///
    /// Each handle yields true if that stage published the solution.
    ///
    /// The queues are created here and every end is moved into a stage, so
    /// a queue disconnects as soon as all stages on one side have exited.
    /// If a thread cannot be spawned the search is cancelled.
    pub fn spawn<'scope, 'env>(
        self,
        scope: &'scope Scope<'scope, 'env>,
        ctx: &'scope SearchContext,
    ) -> Vec<ScopedJoinHandle<'scope, bool>> {
        let capacity = self.blocks.len();
        let (unprocessed_tx, unprocessed_rx) = bounded(capacity);
        let (processed_tx, processed_rx) = bounded(capacity);

        for block in self.blocks {
            // Capacity equals the pool size, this never blocks.
            let _ = unprocessed_tx.send(block);
        }

        let mut handles = Vec::with_capacity(self.hashers + 1);
        let (prefix_len, seed) = (self.prefix_len, self.seed);
        let generator = std::thread::Builder::new()
            .name(format!("pow-gen-{}", self.index))
            .spawn_scoped(scope, move || {
                worker::run_generator(ctx, unprocessed_rx, processed_tx, prefix_len, seed);
                false
            });
        match generator {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                log::error!("Failed to spawn generator {}: {}", self.index, e);
                ctx.token.cancel();
            }
        }

        for h in 0..self.hashers {
            let (rx, tx) = (processed_rx.clone(), unprocessed_tx.clone());
            let difficulty = self.difficulty;
            let hasher = std::thread::Builder::new()
                .name(format!("pow-hash-{}-{}", self.index, h))
                .spawn_scoped(scope, move || worker::run_hasher(ctx, rx, tx, difficulty));
            match hasher {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    log::error!("Failed to spawn hasher {}-{}: {}", self.index, h, e);
                    ctx.token.cancel();
                }
            }
        }

        handles
    }
}
