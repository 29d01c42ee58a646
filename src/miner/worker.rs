// src/miner/worker.rs
//! Generator and hasher stage loops
//!
//! Both loops block only inside `select!`, always with the cancellation
//! signal as one of the arms, and both cancel the shared token on the way
//! out so sibling stages never wait on a queue nobody will feed.

use crate::miner::cancel::CancelToken;
use crate::miner::hash;
use crate::miner::pipeline::Block;
use crate::miner::scheduler::SolutionSlot;
use crate::stats::HashCounter;
use crossbeam_channel::{Receiver, Sender, select};

/// State shared by every stage of every pipeline in one search
pub struct SearchContext {
    /// Broadcast cancellation for the whole search
    pub token: CancelToken,
    /// First-writer-wins solution slot
    pub slot: SolutionSlot,
    /// Candidates hashed so far
    pub hashes: HashCounter,
}

impl SearchContext {
    /// Creates a context with an empty solution slot
    pub fn new(token: CancelToken, hashes: HashCounter) -> Self {
        SearchContext {
            token,
            slot: SolutionSlot::new(),
            hashes,
        }
    }
}

/// Refills blocks with fresh suffixes until cancelled
///
/// The seed chain is carried across blocks so consecutive blocks never
/// repeat candidates.
pub fn run_generator(
    ctx: &SearchContext,
    unprocessed: Receiver<Block>,
    processed: Sender<Block>,
    prefix_len: usize,
    mut seed: u64,
) {
    let _guard = ctx.token.cancel_on_drop();
    let signal = ctx.token.signal();

    while !ctx.token.is_cancelled() {
        let mut block = select! {
            recv(unprocessed) -> msg => match msg {
                Ok(block) => block,
                Err(_) => return,
            },
            recv(signal) -> _ => return,
        };

        for candidate in block.candidates_mut() {
            seed = hash::mutate_suffix(candidate, prefix_len, seed);
        }

        select! {
            send(processed, block) -> res => if res.is_err() { return },
            recv(signal) -> _ => return,
        }
    }
}

/// Scans generated blocks for a candidate meeting `difficulty`
///
/// The first match is offered to the solution slot and the search is
/// cancelled whether or not this hasher won the slot. Returns true only
/// if this hasher's candidate is the published solution.
pub fn run_hasher(
    ctx: &SearchContext,
    processed: Receiver<Block>,
    unprocessed: Sender<Block>,
    difficulty: u32,
) -> bool {
    let _guard = ctx.token.cancel_on_drop();
    let signal = ctx.token.signal();

    while !ctx.token.is_cancelled() {
        let block = select! {
            recv(processed) -> msg => match msg {
                Ok(block) => block,
                Err(_) => return false,
            },
            recv(signal) -> _ => return false,
        };

        let mut scanned = 0u64;
        for candidate in block.candidates() {
            if ctx.token.is_cancelled() {
                ctx.hashes.add(scanned);
                return false;
            }
            scanned += 1;
            if hash::meets_difficulty(candidate, difficulty) {
                ctx.hashes.add(scanned);
                let won = ctx.slot.publish(candidate);
                if won {
                    log::debug!(
                        "Hasher {:?} found a solution",
                        std::thread::current().name()
                    );
                }
                ctx.token.cancel();
                return won;
            }
        }
        ctx.hashes.add(scanned);

        select! {
            send(unprocessed, block) -> res => if res.is_err() { return false },
            recv(signal) -> _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::{Duration, Instant};

    #[test]
    fn generator_fills_suffixes_and_forwards() {
        let ctx = SearchContext::new(CancelToken::new(), HashCounter::default());
        let (utx, urx) = bounded(2);
        let (ptx, prx) = bounded(2);
        utx.send(Block::new(b"ab", 4, 2)).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| run_generator(&ctx, urx, ptx, 2, 99));
            let block = prx.recv_timeout(Duration::from_secs(5)).unwrap();
            for c in block.candidates() {
                assert_eq!(&c[..2], b"ab");
                assert!(c[2..].iter().all(|b| hash::CHARACTER_SET.contains(b)));
            }
            assert_ne!(block.candidates()[0], block.candidates()[1]);
            ctx.token.cancel();
        });
    }

    #[test]
    fn hasher_publishes_and_cancels() {
        let ctx = SearchContext::new(CancelToken::new(), HashCounter::default());
        let (ptx, prx) = bounded(1);
        let (utx, _urx) = bounded(1);
        ptx.send(Block::new(b"zz", 0, 3)).unwrap();

        let won = std::thread::scope(|s| s.spawn(|| run_hasher(&ctx, prx, utx, 0)).join().unwrap());

        assert!(won);
        assert!(ctx.token.is_cancelled());
        assert_eq!(ctx.slot.get(), Some(&b"zz"[..]));
        assert_eq!(ctx.hashes.get(), 1);
    }

    #[test]
    fn racing_hashers_publish_exactly_once() {
        // Difficulty zero: every hasher qualifies on its first candidate.
        let ctx = SearchContext::new(CancelToken::new(), HashCounter::default());
        let winners = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16u8)
                .map(|i| {
                    let (ptx, prx) = bounded(1);
                    let (utx, urx) = bounded(1);
                    ptx.send(Block::new(&[b'a' + i], 4, 8)).unwrap();
                    let ctx = &ctx;
                    s.spawn(move || {
                        let _open = (ptx, urx);
                        run_hasher(ctx, prx, utx, 0)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });

        assert_eq!(winners, 1);
        assert!(ctx.token.is_cancelled());
        assert!(ctx.slot.get().is_some());
    }

    #[test]
    fn idle_stages_exit_on_cancel() {
        let ctx = SearchContext::new(CancelToken::new(), HashCounter::default());
        let (_utx, urx) = bounded::<Block>(1);
        let (ptx, _prx) = bounded::<Block>(1);
        let (_ptx2, prx2) = bounded::<Block>(1);
        let (utx2, _urx2) = bounded::<Block>(1);

        let start = Instant::now();
        std::thread::scope(|s| {
            s.spawn(|| run_generator(&ctx, urx, ptx, 0, 1));
            s.spawn(|| run_hasher(&ctx, prx2, utx2, 8));
            std::thread::sleep(Duration::from_millis(10));
            ctx.token.cancel();
        });
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
