// src/main.rs
use clap::Parser;
use pow_cluster_rs::cli::{
    Action, BenchmarkOptions, ConfigOptions, MasterOptions, SolveOptions, WorkerOptions,
};
use pow_cluster_rs::coordinator::{master, worker};
use pow_cluster_rs::miner::hash;
use pow_cluster_rs::utils::init_bench_logging;
use pow_cluster_rs::*;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;

/// Main entry point
///
/// Parses command line arguments and delegates to the subcommand handler.
fn main() -> Result<(), PowError> {
    let cli = Commands::parse();

    match cli.action {
        Action::Master(opts) => run_master(opts),
        Action::Worker(opts) => run_worker(opts),
        Action::Solve(opts) => solve(opts),
        Action::Benchmark(opts) => run_benchmark(opts),
        Action::Config(opts) => generate_config(opts),
    }
}

/// Runs the master: binds, starts health polling and serves until killed
fn run_master(opts: MasterOptions) -> Result<(), PowError> {
    init_logging();
    let MasterOptions {
        port,
        host,
        advertise_host,
        config: config_path,
    } = opts;
    let config = config::load(config_path)?;

    let rt = Runtime::new()?;
    rt.block_on(async move {
        let listener = TcpListener::bind((host.as_str(), port)).await?;
        let port = listener.local_addr()?.port();
        let advertise = advertise_host.unwrap_or(host);
        let completion = master::completion_endpoint(&advertise, port);

        let registry = Arc::new(WorkerRegistry::new(config.master.max_health_failures));
        let coordinator = Arc::new(MasterCoordinator::new(config.master, registry, completion)?);
        log::info!("Workers report to {}", coordinator.completion_endpoint());

        master::serve(listener, coordinator).await
    })
}

/// Runs a worker: optional self-registration, stats reporting and serving
fn run_worker(opts: WorkerOptions) -> Result<(), PowError> {
    init_logging();
    let WorkerOptions {
        port,
        host,
        master: master_addr,
        advertise_host,
        pipelines,
        hashers,
        config: config_path,
    } = opts;
    let mut config = config::load(config_path)?;
    apply_search_overrides(&mut config, pipelines, hashers);

    // Resolve our identity before serving anything; failing here is fatal.
    let registration = match master_addr {
        Some(master_addr) => {
            let own_address = worker::advertised_address(advertise_host.as_deref(), port)?;
            let client = MasterClient::new(
                reqwest::Client::new(),
                &master_addr,
                config.worker.request_timeout(),
            )?;
            Some((client, own_address))
        }
        None => None,
    };

    let reporter = StatsReporter::new(config.search.stats_interval());
    reporter.start_reporting();
    let coordinator = Arc::new(WorkerCoordinator::new(&config, reporter)?);
    let register_interval = config.worker.register_interval();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        let listener = TcpListener::bind((host.as_str(), port)).await?;

        if let Some((client, own_address)) = registration {
            tokio::spawn(worker::register_with_master(
                client,
                own_address,
                register_interval,
            ));
        }

        worker::serve(listener, coordinator).await
    })
}

/// Searches locally once and prints the solution with throughput figures
fn solve(opts: SolveOptions) -> Result<(), PowError> {
    init_bench_logging();
    let mut config = config::load(opts.config)?;
    apply_search_overrides(&mut config, opts.pipelines, opts.hashers);

    let target = SearchTarget::new(opts.prefix, opts.difficulty)?;
    let reporter = StatsReporter::new(config.search.stats_interval());
    let scheduler = Scheduler::new(&config.search, reporter.hash_counter());
    log::info!(
        "Solving {} with {} pipeline(s) x {} hasher(s)",
        target,
        scheduler.pipelines(),
        scheduler.hashers()
    );

    let start = Instant::now();
    let solution = scheduler
        .search(&target, &CancelToken::new())
        .ok_or(PowError::Cancelled)?;
    let elapsed = start.elapsed().as_secs_f64();
    let hashes = reporter.hash_counter().get();

    println!("{}", solution);
    log::info!("digest: {}", solution.digest_hex());
    log::info!("time: {:.3}s", elapsed);
    log::info!("processed: {}", hashes);
    log::info!("processed/sec: {:.0}", hashes as f64 / elapsed.max(1e-9));
    Ok(())
}

/// Runs the candidate hashing benchmark
///
/// Every thread mutates and hashes its own buffer until the deadline,
/// mirroring the work a generator and hasher do per candidate.
fn run_benchmark(opts: BenchmarkOptions) -> Result<(), PowError> {
    init_bench_logging();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads.max(1))
        .build()
        .map_err(|e| PowError::ConfigError(format!("Failed to build thread pool: {}", e)))?;
    let reporter = StatsReporter::new(Duration::from_secs(5));
    reporter.start_reporting();
    let counter = reporter.hash_counter();

    log::info!(
        "Starting benchmark on {} thread(s) for {} seconds",
        opts.threads,
        opts.duration
    );

    const PREFIX: &[u8] = b"bench";
    const BATCH: u64 = 1024;
    let deadline = Instant::now() + Duration::from_secs(opts.duration);

    pool.install(|| {
        (0..opts.threads.max(1)).into_par_iter().for_each(|index| {
            let mut buffer = PREFIX.to_vec();
            buffer.resize(PREFIX.len() + opts.suffix_len, 0);
            let mut seed = hash::seed_from_clock(index);
            let started = Instant::now();
            let mut done = 0u64;

            while Instant::now() < deadline {
                for _ in 0..BATCH {
                    seed = hash::mutate_suffix(&mut buffer, PREFIX.len(), seed);
                    let _ = hash::meets_difficulty(&buffer, 256);
                }
                counter.add(BATCH);
                done += BATCH;
            }

            log::debug!(
                "Thread {}: {:.1} H/s",
                index,
                done as f64 / started.elapsed().as_secs_f64().max(1e-9)
            );
        })
    });

    let stats = reporter.get_stats();
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", stats.hashes_total);
    log::info!(
        "Average hashrate: {:.2} H/s",
        stats.hashes_total as f64 / opts.duration.max(1) as f64
    );
    log::logger().flush();

    Ok(())
}

/// Writes a configuration template
fn generate_config(opts: ConfigOptions) -> Result<(), PowError> {
    std::fs::write(&opts.output, config::generate_template())?;
    println!("Wrote {}", opts.output.display());
    Ok(())
}

fn apply_search_overrides(config: &mut Config, pipelines: Option<usize>, hashers: Option<usize>) {
    if let Some(pipelines) = pipelines {
        config.search.pipelines = pipelines;
    }
    if let Some(hashers) = hashers {
        config.search.hashers_per_pipeline = hashers;
    }
}
