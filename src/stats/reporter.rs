// src/stats/reporter.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use sysinfo::System;

/// Lock-free counter of hashed candidates
///
/// Cloned into every hasher stage; each stage adds once per scanned block.
#[derive(Clone, Debug, Default)]
pub struct HashCounter(Arc<AtomicU64>);

impl HashCounter {
    /// Adds `n` hashes
    #[inline]
    pub fn add(&self, n: u64) {
        if n > 0 {
            self.0.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Total hashes recorded so far
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Snapshot of search statistics
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Total number of candidates hashed
    pub hashes_total: u64,
    /// Searches that ended with a solution
    pub solutions_found: u64,
    /// Searches that ended by cancellation
    pub searches_cancelled: u64,
    /// Average hashrate since the reporter started (hashes per second)
    pub avg_hashrate: f64,
}

/// Atomic outcome counters shared with the coordinator
#[derive(Debug, Default)]
struct OutcomeCounters {
    solutions: AtomicU64,
    cancelled: AtomicU64,
}

/// Collects and periodically logs search statistics
#[derive(Clone)]
pub struct StatsReporter {
    hashes: HashCounter,
    outcomes: Arc<OutcomeCounters>,
    start_time: Instant,
    report_interval: Duration,
}

impl StatsReporter {
    /// Creates a new reporter with the specified reporting interval
    pub fn new(report_interval: Duration) -> Self {
        StatsReporter {
            hashes: HashCounter::default(),
            outcomes: Arc::new(OutcomeCounters::default()),
            start_time: Instant::now(),
            report_interval,
        }
    }

    /// Counter to hand to the search scheduler
    pub fn hash_counter(&self) -> HashCounter {
        self.hashes.clone()
    }

    /// Records the outcome of one finished search
    pub fn record_search(&self, found: bool) {
        let counter = if found {
            &self.outcomes.solutions
        } else {
            &self.outcomes.cancelled
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the current statistics
    pub fn get_stats(&self) -> MiningStats {
        let hashes = self.hashes.get();
        let seconds = self.start_time.elapsed().as_secs_f64().max(1e-3);

        MiningStats {
            hashes_total: hashes,
            solutions_found: self.outcomes.solutions.load(Ordering::Relaxed),
            searches_cancelled: self.outcomes.cancelled.load(Ordering::Relaxed),
            avg_hashrate: hashes as f64 / seconds,
        }
    }

    /// Spawns a background thread that logs stats at the configured interval
    ///
    /// Only the hashes done since the previous report count towards the
    /// logged rate, so idle workers report zero instead of a decaying
    /// average.
    pub fn start_reporting(&self) {
        let reporter = self.clone();

        std::thread::spawn(move || {
            let mut system = System::new();
            let mut last_hashes = reporter.hashes.get();
            let mut last_tick = Instant::now();

            loop {
                std::thread::sleep(reporter.report_interval);
                system.refresh_cpu_usage();

                let stats = reporter.get_stats();
                let window = last_tick.elapsed().as_secs_f64().max(1e-3);
                let rate = (stats.hashes_total - last_hashes) as f64 / window;
                last_hashes = stats.hashes_total;
                last_tick = Instant::now();

                log::info!(
                    "Hashrate: {:.2} H/s | Total: {} | Solved/Cancelled: {}/{} | CPU: {:.1}%",
                    rate,
                    stats.hashes_total,
                    stats.solutions_found,
                    stats.searches_cancelled,
                    system.global_cpu_usage()
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_is_shared_between_clones() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        let counter = reporter.hash_counter();
        counter.add(10);
        counter.clone().add(5);
        assert_eq!(reporter.get_stats().hashes_total, 15);
    }

    #[test]
    fn outcomes_are_tallied() {
        let reporter = StatsReporter::new(Duration::from_secs(60));
        reporter.record_search(true);
        reporter.record_search(false);
        reporter.record_search(false);
        let stats = reporter.get_stats();
        assert_eq!(stats.solutions_found, 1);
        assert_eq!(stats.searches_cancelled, 2);
    }
}
