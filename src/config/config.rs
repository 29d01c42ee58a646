// src/config/config.rs
use crate::utils::error::PowError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
///
/// Every section and field has a default, so an empty file (or no file at
/// all) is a valid configuration. Command-line flags are applied on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local search engine sizing
    #[serde(default)]
    pub search: SearchConfig,

    /// Worker process settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Master process settings
    #[serde(default)]
    pub master: MasterConfig,
}

/// Sizing of the local search pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Pipeline instances per search (0 = derive from CPU count)
    #[serde(default)]
    pub pipelines: usize,

    /// Hasher stages per pipeline; one generator keeps about three busy
    #[serde(default = "default_hashers")]
    pub hashers_per_pipeline: usize,

    /// Candidates per block
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Random suffix length appended to the prefix
    #[serde(default = "default_suffix_len")]
    pub suffix_len: usize,

    /// Interval between hashrate log lines, in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// Worker process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How long `/cancel` waits for the search to stop
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_ms: u64,

    /// Interval between registration announcements to the master
    #[serde(default = "default_register_interval")]
    pub register_interval_ms: u64,

    /// Timeout for outbound requests (registration, completion callback)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// Master process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Interval between health-check sweeps
    #[serde(default = "default_health_interval")]
    pub health_interval_ms: u64,

    /// Timeout of a single health check
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout_ms: u64,

    /// Consecutive failures tolerated before a worker is marked dead
    #[serde(default = "default_max_health_failures")]
    pub max_health_failures: u32,

    /// How long `/start` waits for a worker to report a solution
    #[serde(default = "default_solution_timeout")]
    pub solution_timeout_ms: u64,

    /// Timeout for start/cancel fan-out requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_hashers() -> usize {
    3
}

fn default_block_size() -> usize {
    512
}

fn default_suffix_len() -> usize {
    100
}

fn default_stats_interval() -> u64 {
    60
}

fn default_cancel_timeout() -> u64 {
    1_000
}

fn default_register_interval() -> u64 {
    60_000
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_health_interval() -> u64 {
    10_000
}

fn default_health_check_timeout() -> u64 {
    5_000
}

fn default_max_health_failures() -> u32 {
    5
}

fn default_solution_timeout() -> u64 {
    600_000
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            pipelines: 0,
            hashers_per_pipeline: default_hashers(),
            block_size: default_block_size(),
            suffix_len: default_suffix_len(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl SearchConfig {
    /// Interval between hashrate reports
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            cancel_timeout_ms: default_cancel_timeout(),
            register_interval_ms: default_register_interval(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl WorkerConfig {
    /// Cancel acknowledgement deadline
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }

    /// Registration announcement interval
    pub fn register_interval(&self) -> Duration {
        Duration::from_millis(self.register_interval_ms.max(1))
    }

    /// Outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            health_interval_ms: default_health_interval(),
            health_check_timeout_ms: default_health_check_timeout(),
            max_health_failures: default_max_health_failures(),
            solution_timeout_ms: default_solution_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl MasterConfig {
    /// Health sweep interval
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms.max(1))
    }

    /// Single health check timeout
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Deadline for a solution to arrive
    pub fn solution_timeout(&self) -> Duration {
        Duration::from_millis(self.solution_timeout_ms)
    }

    /// Fan-out request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(PowError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PowError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            PowError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(toml::from_str(&config_str)?)
    }

    /// Generates a commented configuration template holding the defaults
    pub fn generate_template() -> String {
        let search = SearchConfig::default();
        let worker = WorkerConfig::default();
        let master = MasterConfig::default();
        let mut template = String::new();

        template.push_str("# PoW cluster configuration\n\n");
        template.push_str("[search]\n");
        template.push_str("# Pipeline instances per search (0 = auto-detect from CPUs)\n");
        template.push_str(&format!("pipelines = {}\n", search.pipelines));
        template.push_str("# Hasher stages fed by each generator\n");
        template.push_str(&format!(
            "hashers_per_pipeline = {}\n",
            search.hashers_per_pipeline
        ));
        template.push_str("# Candidates per block\n");
        template.push_str(&format!("block_size = {}\n", search.block_size));
        template.push_str("# Random suffix length appended to the prefix\n");
        template.push_str(&format!("suffix_len = {}\n", search.suffix_len));
        template.push_str(&format!(
            "stats_interval_secs = {}\n\n",
            search.stats_interval_secs
        ));

        template.push_str("[worker]\n");
        template.push_str(&format!("cancel_timeout_ms = {}\n", worker.cancel_timeout_ms));
        template.push_str(&format!(
            "register_interval_ms = {}\n",
            worker.register_interval_ms
        ));
        template.push_str(&format!(
            "request_timeout_ms = {}\n\n",
            worker.request_timeout_ms
        ));

        template.push_str("[master]\n");
        template.push_str(&format!(
            "health_interval_ms = {}\n",
            master.health_interval_ms
        ));
        template.push_str(&format!(
            "health_check_timeout_ms = {}\n",
            master.health_check_timeout_ms
        ));
        template.push_str("# Workers failing more checks than this in a row are dropped for good\n");
        template.push_str(&format!(
            "max_health_failures = {}\n",
            master.max_health_failures
        ));
        template.push_str("# How long /start waits for a solution before answering 504\n");
        template.push_str(&format!(
            "solution_timeout_ms = {}\n",
            master.solution_timeout_ms
        ));
        template.push_str(&format!(
            "request_timeout_ms = {}\n",
            master.request_timeout_ms
        ));

        template
    }
}
