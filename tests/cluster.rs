// tests/cluster.rs
//! Master and workers talking over real sockets on 127.0.0.1

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};
use pow_cluster_rs::config::{Config, MasterConfig, SearchConfig};
use pow_cluster_rs::coordinator::{master, worker};
use pow_cluster_rs::{
    MasterClient, MasterCoordinator, SearchTarget, StatsReporter, WorkerClient, WorkerCoordinator,
    WorkerRegistry,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn small_search() -> SearchConfig {
    SearchConfig {
        pipelines: 1,
        hashers_per_pipeline: 1,
        block_size: 64,
        suffix_len: 16,
        ..SearchConfig::default()
    }
}

async fn spawn_worker() -> String {
    spawn_worker_with_handle().await.0
}

async fn spawn_worker_with_handle() -> (String, Arc<WorkerCoordinator>) {
    let config = Config {
        search: small_search(),
        ..Config::default()
    };
    let coordinator = Arc::new(
        WorkerCoordinator::new(&config, StatsReporter::new(Duration::from_secs(60))).unwrap(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(worker::serve(listener, coordinator.clone()));
    (address, coordinator)
}

async fn spawn_master(config: MasterConfig) -> (String, Arc<MasterCoordinator>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let registry = Arc::new(WorkerRegistry::new(config.max_health_failures));
    let coordinator = Arc::new(
        MasterCoordinator::new(
            config,
            registry,
            master::completion_endpoint("127.0.0.1", port),
        )
        .unwrap(),
    );
    tokio::spawn(master::serve(listener, coordinator.clone()));
    (format!("http://127.0.0.1:{}", port), coordinator)
}

fn master_client(address: &str) -> MasterClient {
    MasterClient::new(reqwest::Client::new(), address, REQUEST_TIMEOUT).unwrap()
}

/// Worker stand-in that accepts everything and never solves
struct MockWorker {
    starts: AtomicUsize,
    cancels: AtomicUsize,
    healthy: AtomicBool,
}

async fn mock_start(Extension(mock): Extension<Arc<MockWorker>>) -> &'static str {
    mock.starts.fetch_add(1, Ordering::SeqCst);
    ""
}

async fn mock_cancel(Extension(mock): Extension<Arc<MockWorker>>) -> &'static str {
    mock.cancels.fetch_add(1, Ordering::SeqCst);
    ""
}

async fn mock_health(Extension(mock): Extension<Arc<MockWorker>>) -> StatusCode {
    if mock.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn spawn_mock(healthy: bool) -> (String, Arc<MockWorker>) {
    let mock = Arc::new(MockWorker {
        starts: AtomicUsize::new(0),
        cancels: AtomicUsize::new(0),
        healthy: AtomicBool::new(healthy),
    });
    let app = Router::new()
        .route("/start", get(mock_start))
        .route("/cancel", get(mock_cancel))
        .route("/health-check", get(mock_health))
        .layer(Extension(mock.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await });
    (address, mock)
}

async fn eventually(deadline: Duration, mut check: impl AsyncFnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_workers_solve_through_master() {
    let (master_addr, coordinator) = spawn_master(MasterConfig::default()).await;
    let client = master_client(&master_addr);
    for _ in 0..2 {
        client.add_worker(&spawn_worker().await).await.unwrap();
    }
    assert_eq!(coordinator.registry().list_healthy().await.len(), 2);

    let target = SearchTarget::new("test", 8).unwrap();
    let solution = client.start(&target).await.unwrap();

    assert!(solution.starts_with("test"));
    assert!(target.accepts(&solution));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn losing_worker_is_cancelled() {
    let (master_addr, _coordinator) = spawn_master(MasterConfig::default()).await;
    let client = master_client(&master_addr);
    let (mock_addr, mock) = spawn_mock(true).await;
    client.add_worker(&spawn_worker().await).await.unwrap();
    client.add_worker(&mock_addr).await.unwrap();

    let target = SearchTarget::new("test", 8).unwrap();
    let solution = client.start(&target).await.unwrap();
    assert!(target.accepts(&solution));
    assert_eq!(mock.starts.load(Ordering::SeqCst), 1);

    let cancelled = eventually(Duration::from_secs(5), async || {
        mock.cancels.load(Ordering::SeqCst) > 0
    })
    .await;
    assert!(cancelled, "mock worker never received /cancel");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dead_worker_is_excluded_from_fan_out() {
    let config = MasterConfig {
        health_interval_ms: 20,
        health_check_timeout_ms: 500,
        max_health_failures: 5,
        ..MasterConfig::default()
    };
    let (master_addr, coordinator) = spawn_master(config).await;
    let client = master_client(&master_addr);
    let (mock_addr, mock) = spawn_mock(false).await;
    client.add_worker(&mock_addr).await.unwrap();
    client.add_worker(&spawn_worker().await).await.unwrap();

    let registry = coordinator.registry().clone();
    let dead = eventually(Duration::from_secs(10), async || {
        registry
            .lookup(&mock_addr)
            .await
            .is_some_and(|record| record.dead)
    })
    .await;
    assert!(dead, "failing worker was never marked dead");
    assert!(registry.lookup(&mock_addr).await.unwrap().failures > 5);

    // Coming back does not revive it.
    mock.healthy.store(true, Ordering::SeqCst);
    client.add_worker(&mock_addr).await.unwrap();
    assert!(registry.lookup(&mock_addr).await.unwrap().dead);

    let target = SearchTarget::new("dead", 6).unwrap();
    let solution = client.start(&target).await.unwrap();
    assert!(target.accepts(&solution));
    assert_eq!(mock.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn idle_worker_cancel_returns_quickly() {
    let address = spawn_worker().await;
    let workers = WorkerClient::new(reqwest::Client::new(), REQUEST_TIMEOUT);

    let start = Instant::now();
    workers.cancel(&address).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));

    let time = workers.health_check(&address, REQUEST_TIMEOUT).await.unwrap();
    assert!(!time.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_start_without_callback_returns_solution() {
    let address = spawn_worker().await;
    let workers = WorkerClient::new(reqwest::Client::new(), REQUEST_TIMEOUT);

    let target = SearchTarget::new("sync", 6).unwrap();
    let solution = workers.start(&address, &target, None).await.unwrap();
    assert!(target.accepts(&solution));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn master_without_workers_is_unavailable() {
    let (master_addr, _coordinator) = spawn_master(MasterConfig::default()).await;
    let response = reqwest::get(format!("{}/start?prefix=x&difficulty=1", master_addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_parameters_are_rejected() {
    let (master_addr, _coordinator) = spawn_master(MasterConfig::default()).await;
    let worker_addr = spawn_worker().await;

    let bad = [
        format!("{}/start?prefix=x&difficulty=abc", master_addr),
        format!("{}/start?difficulty=3", master_addr),
        format!("{}/start?prefix=x&difficulty=257", master_addr),
        format!("{}/completion", master_addr),
        format!("{}/add-worker?host=not-a-url", master_addr),
        format!("{}/start?prefix=x&difficulty=-1", worker_addr),
        format!("{}/start?prefix=x", worker_addr),
        format!(
            "{}/start?prefix=x&difficulty=1&completionEndpoint=nowhere",
            worker_addr
        ),
    ];
    for url in bad {
        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", url);
        assert!(!response.text().await.unwrap().is_empty());
    }
}

fn impatient_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_start_stops_when_caller_hangs_up() {
    let (address, coordinator) = spawn_worker_with_handle().await;

    let result = impatient_client()
        .get(format!("{}/start?prefix=x&difficulty=200", address))
        .send()
        .await;
    assert!(result.is_err());

    let stopped = eventually(Duration::from_secs(5), async || !coordinator.is_searching()).await;
    assert!(stopped, "search kept running after its caller left");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_master_start_cancels_workers() {
    let config = MasterConfig {
        solution_timeout_ms: 60_000,
        ..MasterConfig::default()
    };
    let (master_addr, coordinator) = spawn_master(config).await;
    let (mock_addr, mock) = spawn_mock(true).await;
    master_client(&master_addr).add_worker(&mock_addr).await.unwrap();

    let result = impatient_client()
        .get(format!("{}/start?prefix=gone&difficulty=8", master_addr))
        .send()
        .await;
    assert!(result.is_err());
    assert_eq!(mock.starts.load(Ordering::SeqCst), 1);

    let cancelled = eventually(Duration::from_secs(5), async || {
        mock.cancels.load(Ordering::SeqCst) > 0
    })
    .await;
    assert!(cancelled, "workers were not cancelled after the caller left");

    // The session is closed: a bogus solution is discarded, not rejected.
    coordinator.complete("not-a-solution").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropped_start_future_closes_session() {
    let (_master_addr, coordinator) = spawn_master(MasterConfig::default()).await;
    let (mock_addr, mock) = spawn_mock(true).await;
    coordinator.register_worker(&mock_addr).await.unwrap();

    let pending = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .start(SearchTarget::new("gone", 8).unwrap())
                .await
        })
    };
    let started = eventually(Duration::from_secs(5), async || {
        mock.starts.load(Ordering::SeqCst) > 0
    })
    .await;
    assert!(started);
    assert!(coordinator.complete("not-a-solution").await.is_err());

    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    let cancelled = eventually(Duration::from_secs(5), async || {
        mock.cancels.load(Ordering::SeqCst) > 0
    })
    .await;
    assert!(cancelled);
    coordinator.complete("not-a-solution").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn solution_timeout_cancels_workers() {
    let config = MasterConfig {
        solution_timeout_ms: 200,
        ..MasterConfig::default()
    };
    let (master_addr, _coordinator) = spawn_master(config).await;
    let (mock_addr, mock) = spawn_mock(true).await;
    master_client(&master_addr).add_worker(&mock_addr).await.unwrap();

    let response = reqwest::get(format!("{}/start?prefix=slow&difficulty=8", master_addr))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let cancelled = eventually(Duration::from_secs(5), async || {
        mock.cancels.load(Ordering::SeqCst) > 0
    })
    .await;
    assert!(cancelled);
}
