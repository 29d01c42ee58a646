// src/coordinator/master.rs
//! Master process coordinator
//!
//! Fans a search out to every live worker, waits for the first valid
//! completion callback, then fans out `/cancel` to the others. A
//! background loop health-checks workers and retires the ones that keep
//! failing.
//!
//! Only one search session is open at a time. A new `/start` supersedes
//! the previous one; its caller receives a 409.

use crate::config::MasterConfig;
use crate::coordinator::registry::{HealthUpdate, WorkerRegistry};
use crate::network::{WorkerClient, parse_base};
use crate::types::{SearchTarget, Solution};
use crate::utils::error::PowError;
use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Router};
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tokio::time::MissedTickBehavior;

/// A `/start` call waiting for its solution
struct Session {
    id: u64,
    target: SearchTarget,
    reply: oneshot::Sender<Solution>,
}

/// The single open session, shared with cleanup tasks
type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Closes an unanswered session when its `/start` call ends
///
/// Covers the timeout and a caller that hung up alike. `Drop` cannot
/// await, so the cleanup runs as a spawned task.
struct SessionGuard {
    id: u64,
    session: SessionSlot,
    registry: Arc<WorkerRegistry>,
    workers: WorkerClient,
    armed: bool,
}

impl SessionGuard {
    /// Called once the session has been answered with a solution
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let id = self.id;
        let session = self.session.clone();
        let registry = self.registry.clone();
        let workers = self.workers.clone();
        runtime.spawn(async move {
            if close_session(&session, id).await {
                log::info!("Session {} ended without a solution; cancelling workers", id);
                cancel_workers(registry, workers).await;
            }
        });
    }
}

/// Serves `/start`, `/completion` and `/add-worker`
pub struct MasterCoordinator {
    registry: Arc<WorkerRegistry>,
    workers: WorkerClient,
    config: MasterConfig,
    completion_endpoint: String,
    session: SessionSlot,
    next_session: AtomicU64,
}

impl MasterCoordinator {
    /// Creates a master using `registry` for worker bookkeeping
    ///
    /// # Arguments
    /// * `config` - Timeouts and health policy
    /// * `registry` - Worker registry shared with the health poller
    /// * `completion_endpoint` - Full URL workers call back, e.g.
    ///   `http://master:8079/completion`
    pub fn new(
        config: MasterConfig,
        registry: Arc<WorkerRegistry>,
        completion_endpoint: String,
    ) -> Result<Self, PowError> {
        parse_base(&completion_endpoint)?;
        let client = Client::builder().build()?;
        Ok(MasterCoordinator {
            registry,
            workers: WorkerClient::new(client, config.request_timeout()),
            config,
            completion_endpoint,
            session: Arc::new(Mutex::new(None)),
            next_session: AtomicU64::new(1),
        })
    }

    /// The worker registry
    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Callback URL handed to workers
    pub fn completion_endpoint(&self) -> &str {
        &self.completion_endpoint
    }

    /// Registers a worker by its base address
    ///
    /// # Errors
    /// `PowError::InputError` if `host` is not an http(s) URL
    pub async fn register_worker(&self, host: &str) -> Result<(), PowError> {
        parse_base(host)?;
        let address = host.trim().trim_end_matches('/');
        if self.registry.register(address).await {
            let known = self.registry.snapshot().await;
            log::info!(
                "Added worker {} ({} known, {} dead)",
                address,
                known.len(),
                known.iter().filter(|r| r.dead).count()
            );
        }
        Ok(())
    }

    /// Runs a search across the cluster and waits for the first solution
    ///
    /// # Errors
    /// - `PowError::NoWorkers` if no live worker accepted the request
    /// - `PowError::Superseded` if another start replaced this session
    /// - `PowError::SolutionTimeout` if nothing arrived in time
    ///
    /// Unless a solution was delivered, the session is closed and workers
    /// are cancelled when this returns or its future is dropped.
    pub async fn start(&self, target: SearchTarget) -> Result<Solution, PowError> {
        let workers = self.registry.list_healthy().await;
        if workers.is_empty() {
            return Err(PowError::NoWorkers);
        }

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (reply, solution) = oneshot::channel();
        let previous = self.session.lock().await.replace(Session {
            id,
            target: target.clone(),
            reply,
        });
        if let Some(previous) = previous {
            log::warn!("Session {} superseded by session {}", previous.id, id);
        }
        let mut guard = SessionGuard {
            id,
            session: self.session.clone(),
            registry: self.registry.clone(),
            workers: self.workers.clone(),
            armed: true,
        };

        log::info!("Session {}: {} across {} worker(s)", id, target, workers.len());
        let accepted = self.fan_out_start(&workers, &target).await;
        if accepted == 0 {
            return Err(PowError::NoWorkers);
        }

        let timeout = self.config.solution_timeout();
        match tokio::time::timeout(timeout, solution).await {
            Ok(Ok(solution)) => {
                guard.disarm();
                log::info!("Session {} solved: {}", id, solution);
                Ok(solution)
            }
            Ok(Err(_)) => Err(PowError::Superseded),
            Err(_) => {
                log::warn!("Session {} timed out after {:?}", id, timeout);
                Err(PowError::SolutionTimeout(timeout))
            }
        }
    }

    /// Accepts a solution reported by a worker
    ///
    /// Valid solutions close the open session and trigger a best-effort
    /// cancel of every responsive worker. Solutions arriving with no open
    /// session are discarded.
    ///
    /// # Errors
    /// `PowError::InputError` if the solution does not satisfy the open
    /// session's prefix and difficulty
    pub async fn complete(&self, solution: &str) -> Result<(), PowError> {
        let mut open = self.session.lock().await;
        let Some(session) = open.take() else {
            log::debug!("Discarding late solution {:?}", solution);
            return Ok(());
        };

        if !session.target.accepts(solution) {
            let target = session.target.to_string();
            *open = Some(session);
            return Err(PowError::InputError(format!(
                "solution {:?} does not satisfy {}",
                solution, target
            )));
        }
        drop(open);

        if session
            .reply
            .send(Solution::from_candidate(solution.as_bytes()))
            .is_err()
        {
            log::warn!("Caller of session {} is gone", session.id);
        }
        tokio::spawn(cancel_workers(self.registry.clone(), self.workers.clone()));
        Ok(())
    }

    /// Health-checks every live worker once
    pub async fn poll_health_once(&self) {
        let workers = self.registry.list_healthy().await;
        let timeout = self.config.health_check_timeout();

        let results = join_all(workers.iter().map(|worker| async move {
            let result = self.workers.health_check(worker, timeout).await;
            (worker, result)
        }))
        .await;

        for (worker, result) in results {
            let update = self.registry.record_health(worker, result.is_ok()).await;
            match (update, result) {
                (HealthUpdate::MarkedDead, Err(e)) => {
                    log::warn!("Worker {} marked dead after repeated failures: {}", worker, e)
                }
                (HealthUpdate::Failing(n), Err(e)) => {
                    log::info!("Health check {} of {} failed: {}", n, worker, e)
                }
                _ => {}
            }
        }
    }

    /// Polls worker health forever at the configured interval
    pub async fn run_health_poll(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.health_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.poll_health_once().await;
        }
    }

    /// Sends `/start` with the completion callback to each worker
    ///
    /// Returns how many workers accepted the request.
    async fn fan_out_start(&self, workers: &[String], target: &SearchTarget) -> usize {
        let completion = Some(self.completion_endpoint.as_str());
        let results = join_all(
            workers
                .iter()
                .map(|worker| self.workers.start(worker, target, completion)),
        )
        .await;

        workers
            .iter()
            .zip(results)
            .filter(|(worker, result)| match result {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Failed to start {}: {}", worker, e);
                    false
                }
            })
            .count()
    }

}

/// Closes session `id` if it is still the open one
///
/// Returns true if this call closed it.
async fn close_session(session: &Mutex<Option<Session>>, id: u64) -> bool {
    let mut open = session.lock().await;
    if open.as_ref().is_some_and(|s| s.id == id) {
        open.take();
        true
    } else {
        false
    }
}

/// Best-effort `/cancel` to every worker with no outstanding failures
async fn cancel_workers(registry: Arc<WorkerRegistry>, workers: WorkerClient) {
    let targets = registry.list_responsive().await;
    let results = join_all(targets.iter().map(|w| workers.cancel(w))).await;
    for (worker, result) in targets.iter().zip(results) {
        if let Err(e) = result {
            log::debug!("Cancel of {} failed: {}", worker, e);
        }
    }
}

/// Builds the completion callback URL for a master reachable at `host:port`
pub fn completion_endpoint(host: &str, port: u16) -> String {
    format!("http://{}:{}/completion", host, port)
}

/// Query parameters of `/start`
#[derive(Debug, Deserialize)]
pub struct StartParams {
    prefix: Option<String>,
    difficulty: Option<String>,
}

/// Query parameters of `/completion`
#[derive(Debug, Deserialize)]
pub struct CompletionParams {
    solution: Option<String>,
}

/// Query parameters of `/add-worker`
#[derive(Debug, Deserialize)]
pub struct AddWorkerParams {
    host: Option<String>,
}

async fn handle_start(
    Extension(master): Extension<Arc<MasterCoordinator>>,
    Query(params): Query<StartParams>,
) -> Result<String, PowError> {
    let target = SearchTarget::from_params(params.prefix, params.difficulty)?;
    Ok(master.start(target).await?.into())
}

async fn handle_completion(
    Extension(master): Extension<Arc<MasterCoordinator>>,
    Query(params): Query<CompletionParams>,
) -> Result<(), PowError> {
    let solution = params
        .solution
        .ok_or_else(|| PowError::InputError("missing parameter: solution".into()))?;
    master.complete(&solution).await
}

async fn handle_add_worker(
    Extension(master): Extension<Arc<MasterCoordinator>>,
    Query(params): Query<AddWorkerParams>,
) -> Result<(), PowError> {
    let host = params
        .host
        .ok_or_else(|| PowError::InputError("missing parameter: host".into()))?;
    master.register_worker(&host).await
}

/// HTTP routes of the master
pub fn router(master: Arc<MasterCoordinator>) -> Router {
    Router::new()
        .route("/start", get(handle_start))
        .route("/completion", get(handle_completion))
        .route("/add-worker", get(handle_add_worker))
        .layer(Extension(master))
}

/// Serves the master routes on `listener` and runs the health poller
pub async fn serve(listener: TcpListener, master: Arc<MasterCoordinator>) -> Result<(), PowError> {
    log::info!("Master listening on {}", listener.local_addr()?);
    tokio::spawn(master.clone().run_health_poll());
    axum::serve(listener, router(master)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master() -> MasterCoordinator {
        MasterCoordinator::new(
            MasterConfig::default(),
            Arc::new(WorkerRegistry::new(5)),
            completion_endpoint("localhost", 8079),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_without_workers_is_unavailable() {
        let master = master();
        let target = SearchTarget::new("test", 8).unwrap();
        assert!(matches!(master.start(target).await, Err(PowError::NoWorkers)));
    }

    #[tokio::test]
    async fn register_rejects_bad_hosts() {
        let master = master();
        assert!(master.register_worker("worker:8080").await.is_err());
        master.register_worker("http://worker:8080/").await.unwrap();
        assert!(master.registry().lookup("http://worker:8080").await.is_some());
    }

    #[tokio::test]
    async fn completion_without_session_is_discarded() {
        let master = master();
        master.complete("anything").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_completion_keeps_session_open() {
        let master = master();
        let (reply, mut rx) = oneshot::channel();
        *master.session.lock().await = Some(Session {
            id: 1,
            target: SearchTarget::new("test", 256).unwrap(),
            reply,
        });

        let err = master.complete("test-not-a-solution").await.unwrap_err();
        assert!(matches!(err, PowError::InputError(_)));
        assert!(master.session.lock().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn valid_completion_answers_session() {
        let master = master();
        let (reply, rx) = oneshot::channel();
        *master.session.lock().await = Some(Session {
            id: 1,
            target: SearchTarget::new("test", 0).unwrap(),
            reply,
        });

        master.complete("test123").await.unwrap();
        assert_eq!(rx.await.unwrap().as_str(), "test123");
        assert!(master.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_workers_accumulate_failures() {
        let config = MasterConfig {
            health_check_timeout_ms: 200,
            ..MasterConfig::default()
        };
        let registry = Arc::new(WorkerRegistry::new(1));
        let master = MasterCoordinator::new(
            config,
            registry.clone(),
            completion_endpoint("localhost", 8079),
        )
        .unwrap();
        // A port that was just released refuses connections straight away.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let address = format!("http://127.0.0.1:{}", port);
        master.register_worker(&address).await.unwrap();

        master.poll_health_once().await;
        assert_eq!(registry.lookup(&address).await.unwrap().failures, 1);
        master.poll_health_once().await;
        assert!(registry.lookup(&address).await.unwrap().dead);
    }
}
