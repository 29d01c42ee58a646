// src/coordinator/worker.rs
//! Worker process coordinator
//!
//! Wraps the local [`Scheduler`] behind three HTTP endpoints:
//!
//! | Endpoint        | Params                                   |
//! |-----------------|------------------------------------------|
//! | `/start`        | prefix, difficulty, [completionEndpoint] |
//! | `/cancel`       |                                          |
//! | `/health-check` |                                          |
//!
//! At most one search is tracked at a time. Its cancellation token and a
//! completion flag live in an `ArcSwapOption` so `/cancel` never contends
//! with the search itself.

use crate::config::Config;
use crate::miner::{CancelToken, Scheduler};
use crate::network::{MasterClient, parse_base, report_solution};
use crate::stats::StatsReporter;
use crate::types::{SearchTarget, Solution};
use crate::utils::error::PowError;
use arc_swap::ArcSwapOption;
use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Router};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The search currently running on this worker
struct ActiveSearch {
    target: SearchTarget,
    token: CancelToken,
    finished: watch::Receiver<bool>,
}

/// Serves `/start`, `/cancel` and `/health-check` over a local scheduler
pub struct WorkerCoordinator {
    scheduler: Scheduler,
    stats: StatsReporter,
    client: Client,
    cancel_timeout: Duration,
    request_timeout: Duration,
    active: ArcSwapOption<ActiveSearch>,
}

impl WorkerCoordinator {
    /// Creates a coordinator sized from `config`
    ///
    /// Hashes are counted into `stats`.
    pub fn new(config: &Config, stats: StatsReporter) -> Result<Self, PowError> {
        let client = Client::builder().build()?;
        Ok(WorkerCoordinator {
            scheduler: Scheduler::new(&config.search, stats.hash_counter()),
            stats,
            client,
            cancel_timeout: config.worker.cancel_timeout(),
            request_timeout: config.worker.request_timeout(),
            active: ArcSwapOption::empty(),
        })
    }

    /// Whether a search is currently running
    pub fn is_searching(&self) -> bool {
        self.active.load().is_some()
    }

    /// Runs a search and waits for its outcome
    ///
    /// # Errors
    /// `PowError::Cancelled` if the search was cancelled first
    ///
    /// Dropping the returned future cancels the search, so a caller that
    /// goes away never leaves pipelines running.
    pub async fn search(self: &Arc<Self>, target: SearchTarget) -> Result<Solution, PowError> {
        let (token, search) = self.launch(target);
        let _abandon = token.cancel_on_drop();
        search.await?.ok_or(PowError::Cancelled)
    }

    /// Runs a search in the background and reports to `completion`
    ///
    /// Nothing is reported if the search ends by cancellation. Delivery
    /// failures are logged and dropped.
    pub fn search_with_callback(self: &Arc<Self>, target: SearchTarget, completion: String) {
        let (_, search) = self.launch(target);
        let client = self.client.clone();
        let timeout = self.request_timeout;

        tokio::spawn(async move {
            let solution = match search.await {
                Ok(Some(solution)) => solution,
                Ok(None) => return,
                Err(e) => {
                    log::error!("Search task failed: {}", e);
                    return;
                }
            };
            match report_solution(&client, &completion, &solution, timeout).await {
                Ok(()) => log::info!("Reported {} to {}", solution, completion),
                Err(e) => log::warn!("Failed to report solution to {}: {}", completion, e),
            }
        });
    }

    /// Cancels the running search, if any
    ///
    /// Waits until the search has stopped, at most the configured cancel
    /// timeout.
    ///
    /// # Errors
    /// `PowError::CancelTimeout` if the search did not stop in time
    pub async fn cancel(&self) -> Result<(), PowError> {
        let Some(active) = self.active.load_full() else {
            log::debug!("Cancel requested with no active search");
            return Ok(());
        };

        if active.token.cancel() {
            log::info!("Cancelling search {}", active.target);
        }

        // A closed channel means the search task is gone as well.
        let mut finished = active.finished.clone();
        let stopped = tokio::time::timeout(self.cancel_timeout, finished.wait_for(|done| *done))
            .await
            .is_ok();

        if stopped {
            Ok(())
        } else {
            Err(PowError::CancelTimeout(self.cancel_timeout))
        }
    }

    /// Liveness probe body: the current local time
    pub fn health_check(&self) -> String {
        chrono::Local::now().to_string()
    }

    /// Starts the scheduler on the blocking pool and tracks it as active
    ///
    /// A search that is still running is cancelled first; overlapping
    /// starts are a caller error but must not leak threads.
    fn launch(
        self: &Arc<Self>,
        target: SearchTarget,
    ) -> (CancelToken, JoinHandle<Option<Solution>>) {
        let token = CancelToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        let search = Arc::new(ActiveSearch {
            target: target.clone(),
            token: token.clone(),
            finished: done_rx,
        });

        if let Some(previous) = self.active.swap(Some(search.clone())) {
            log::warn!(
                "Start received while {} is still running; cancelling it",
                previous.target
            );
            previous.token.cancel();
        }

        log::info!("Starting search {}", target);
        let coordinator = Arc::clone(self);
        let search_token = token.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let solution = coordinator.scheduler.search(&target, &search_token);
            coordinator.stats.record_search(solution.is_some());
            match &solution {
                Some(s) => log::info!("Found {} (digest {})", s, s.digest_hex()),
                None => log::info!("Search {} cancelled", target),
            }

            let current = Some(search);
            coordinator.active.compare_and_swap(&current, None::<Arc<ActiveSearch>>);
            let _ = done_tx.send(true);
            solution
        });
        (token, handle)
    }
}

/// Builds the worker's reachable base address
///
/// Uses `advertise_host` when given, otherwise the operating system's
/// host name.
///
/// # Errors
/// `PowError::ConfigError` if no host name can be determined
pub fn advertised_address(advertise_host: Option<&str>, port: u16) -> Result<String, PowError> {
    let host = match advertise_host {
        Some(host) => host.to_string(),
        None => System::host_name().ok_or_else(|| {
            PowError::ConfigError(
                "unable to determine this host's name; pass --advertise-host".into(),
            )
        })?,
    };
    let address = format!("http://{}:{}", host, port);
    parse_base(&address)?;
    Ok(address)
}

/// Announces `own_address` to the master forever
///
/// The first announcement is immediate; failures are logged and retried
/// on the next tick.
pub async fn register_with_master(master: MasterClient, own_address: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    let mut registered = false;

    loop {
        ticker.tick().await;
        match master.add_worker(&own_address).await {
            Ok(()) if !registered => {
                log::info!("Registered {} with master {}", own_address, master.address());
                registered = true;
            }
            Ok(()) => log::debug!("Refreshed registration with {}", master.address()),
            Err(e) => {
                log::warn!("Registration with {} failed: {}", master.address(), e);
                registered = false;
            }
        }
    }
}

/// Query parameters of `/start`
#[derive(Debug, Deserialize)]
pub struct StartParams {
    prefix: Option<String>,
    difficulty: Option<String>,
    #[serde(rename = "completionEndpoint")]
    completion_endpoint: Option<String>,
}

async fn handle_start(
    Extension(coordinator): Extension<Arc<WorkerCoordinator>>,
    Query(params): Query<StartParams>,
) -> Result<String, PowError> {
    let target = SearchTarget::from_params(params.prefix, params.difficulty)?;

    match params.completion_endpoint {
        Some(completion) => {
            parse_base(&completion)?;
            coordinator.search_with_callback(target, completion);
            Ok(String::new())
        }
        None => Ok(coordinator.search(target).await?.into()),
    }
}

async fn handle_cancel(
    Extension(coordinator): Extension<Arc<WorkerCoordinator>>,
) -> Result<(), PowError> {
    coordinator.cancel().await
}

async fn handle_health_check(Extension(coordinator): Extension<Arc<WorkerCoordinator>>) -> String {
    coordinator.health_check()
}

/// HTTP routes of a worker
pub fn router(coordinator: Arc<WorkerCoordinator>) -> Router {
    Router::new()
        .route("/start", get(handle_start))
        .route("/cancel", get(handle_cancel))
        .route("/health-check", get(handle_health_check))
        .layer(Extension(coordinator))
}

/// Serves the worker routes on `listener` until the process exits
pub async fn serve(listener: TcpListener, coordinator: Arc<WorkerCoordinator>) -> Result<(), PowError> {
    log::info!("Worker listening on {}", listener.local_addr()?);
    axum::serve(listener, router(coordinator)).await?;
    Ok(())
}
