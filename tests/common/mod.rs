//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;

use latency_lab::config::ServerConfig;
use latency_lab::http::{AppState, HttpServer};
use latency_lab::lifecycle::Shutdown;
use latency_lab::observability::{LogRecord, LogSink, MetricsRecorder};
use latency_lab::simulator::{LatencySimulator, SimulatorConfig};

/// Sink keeping every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn with_message(&self, message: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.message == message)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn append(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Simulator with a fixed delay and failure probability.
pub fn fixed_simulator(delay_ms: u64, failure_probability: f64) -> LatencySimulator {
    LatencySimulator::with_rng(
        SimulatorConfig {
            min_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            failure_probability,
        },
        StdRng::seed_from_u64(17),
    )
}

pub fn state(simulator: LatencySimulator, sink: Arc<MemorySink>) -> AppState {
    AppState::new(simulator, MetricsRecorder::new().unwrap(), sink)
}

/// A running server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub sink: Arc<MemorySink>,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start(simulator: LatencySimulator) -> Self {
        let sink = Arc::new(MemorySink::default());
        let state = state(simulator, sink.clone());
        let server = HttpServer::new(ServerConfig::default(), state.clone());
        Self::serve(server.router(), state, sink, Some(server)).await
    }

    /// Serve an arbitrary router that was built from `state`.
    #[allow(dead_code)]
    pub async fn start_router(router: Router, state: AppState, sink: Arc<MemorySink>) -> Self {
        Self::serve(router, state, sink, None).await
    }

    async fn serve(
        router: Router,
        state: AppState,
        sink: Arc<MemorySink>,
        server: Option<HttpServer>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        match server {
            Some(server) => {
                tokio::spawn(async move {
                    let _ = server.run(listener, rx).await;
                });
            }
            None => {
                tokio::spawn(async move {
                    let _ = axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = rx.recv().await;
                        })
                        .await;
                });
            }
        }

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        Self {
            addr,
            state,
            sink,
            client,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("server unreachable")
    }

    /// Poll the metrics snapshot until `predicate` holds.
    ///
    /// The observer records when the server drops the response body, which
    /// can land just after the client has read it.
    #[allow(dead_code)]
    pub async fn wait_for_metrics(&self, predicate: impl Fn(&str) -> bool) -> String {
        for _ in 0..50 {
            let snapshot = self.state.metrics.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.state.metrics.snapshot()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Value of the request-duration `_count` series for one label tuple.
#[allow(dead_code)]
pub fn duration_count(snapshot: &str, route: &str, status: u16) -> Option<u64> {
    let labels = format!("route=\"{}\",status_code=\"{}\"", route, status);
    snapshot
        .lines()
        .filter(|l| l.starts_with("http_request_duration_seconds_count{"))
        .filter(|l| l.contains(&labels))
        .find_map(|l| l.rsplit(' ').next()?.parse().ok())
}
