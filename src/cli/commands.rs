use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Distributed proof-of-work search over HTTP
#[derive(Parser, Debug)]
#[command(name = "pow-cluster")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The role or tool to run
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Run the coordinator that fans searches out to workers
    Master(MasterOptions),

    /// Run a search worker
    Worker(WorkerOptions),

    /// Search locally once and print the solution
    Solve(SolveOptions),

    /// Measure raw candidate hashing throughput
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for the master process
#[derive(Parser, Debug)]
pub struct MasterOptions {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8079)]
    pub port: u16,

    /// Host or IP to bind
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Host name workers use to reach this master (defaults to --host)
    #[arg(long)]
    pub advertise_host: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Options for a worker process
#[derive(Parser, Debug)]
pub struct WorkerOptions {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Host or IP to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Master to join, e.g. http://localhost:8079
    #[arg(short, long)]
    pub master: Option<String>,

    /// Host name the master uses to reach this worker (defaults to the OS host name)
    #[arg(long)]
    pub advertise_host: Option<String>,

    /// Pipeline instances per search (overrides config, 0 = auto)
    #[arg(long)]
    pub pipelines: Option<usize>,

    /// Hasher stages per pipeline (overrides config)
    #[arg(long)]
    pub hashers: Option<usize>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Options for a local one-shot search
#[derive(Parser, Debug)]
pub struct SolveOptions {
    /// Prefix every candidate starts with
    #[arg(long)]
    pub prefix: String,

    /// Required leading zero bits
    #[arg(short, long)]
    pub difficulty: u32,

    /// Pipeline instances (overrides config, 0 = auto)
    #[arg(long)]
    pub pipelines: Option<usize>,

    /// Hasher stages per pipeline (overrides config)
    #[arg(long)]
    pub hashers: Option<usize>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Options for running the hashing benchmark
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Random suffix length of each candidate
    #[arg(long, default_value_t = 100)]
    pub suffix_len: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "pow-cluster.toml")]
    pub output: PathBuf,
}
