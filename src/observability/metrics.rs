//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Record per-request latency into a bucketed histogram
//! - Render a point-in-time snapshot in the Prometheus text format
//!
//! # Metrics
//! - `http_request_duration_seconds` (histogram): latency by method, route, status_code
//! - `process_*` (gauges/counters): CPU seconds, resident and virtual memory,
//!   open file descriptors, threads and start time, refreshed on every snapshot
//!
//! # Design Decisions
//! - Each `MetricsRecorder` owns its own recorder; nothing is installed globally,
//!   so tests get isolated label sets
//! - Bucket increments are atomic; rendering never blocks writers for long
//! - Observations are buffered until a render or an upkeep pass drains them.
//!   `spawn_upkeep` drains periodically so an unscraped server stays bounded
//! - `route` is the raw request path. Every distinct path creates a new label
//!   tuple, so cardinality is unbounded when clients probe random paths

use std::sync::{Arc, Weak};
use std::time::Duration;

use metrics::{describe_histogram, histogram, with_local_recorder};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use metrics_process::Collector;
use tokio::task::JoinHandle;

/// Upper bounds (seconds) of the latency histogram; `+Inf` is implicit.
pub const DEFAULT_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0];

/// Content type of [`MetricsRecorder::snapshot`].
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub const REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const PROCESS_START_TIME: &str = "process_start_time_seconds";

/// How often buffered histogram samples are drained between scrapes.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// One completed request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingObservation {
    pub method: String,
    pub route: String,
    pub status_code: u16,
    pub elapsed_seconds: f64,
}

/// Owns the histogram state for the process (or for a single test).
pub struct MetricsRecorder {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    process: Collector,
}

impl MetricsRecorder {
    /// Create a recorder with the default bucket boundaries.
    pub fn new() -> Result<Self, BuildError> {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Create a recorder with custom bucket boundaries.
    pub fn with_buckets(buckets: &[f64]) -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new().set_buckets(buckets)?.build_recorder();
        let handle = recorder.handle();

        let this = Self {
            recorder,
            handle,
            process: Collector::default(),
        };
        this.describe();
        Ok(this)
    }

    fn describe(&self) {
        with_local_recorder(&self.recorder, || {
            describe_histogram!(REQUEST_DURATION, "Duration of HTTP requests in seconds");
            self.process.describe();
            self.process.collect();
        });
    }

    /// Record one observation against its (method, route, status_code) tuple.
    pub fn observe(&self, observation: &TimingObservation) {
        let elapsed = observation.elapsed_seconds.max(0.0);
        with_local_recorder(&self.recorder, || {
            histogram!(
                REQUEST_DURATION,
                "method" => observation.method.clone(),
                "route" => observation.route.clone(),
                "status_code" => observation.status_code.to_string()
            )
            .record(elapsed);
        });
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn snapshot(&self) -> String {
        with_local_recorder(&self.recorder, || self.process.collect());
        self.handle.render()
    }

    /// Fold buffered histogram samples into their buckets.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Run [`run_upkeep`](Self::run_upkeep) every `every` until the recorder is dropped.
    pub fn spawn_upkeep(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let recorder: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match recorder.upgrade() {
                    Some(recorder) => recorder.run_upkeep(),
                    None => break,
                }
            }
            tracing::debug!("Metrics upkeep stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(route: &str, status_code: u16, elapsed_seconds: f64) -> TimingObservation {
        TimingObservation {
            method: "GET".to_string(),
            route: route.to_string(),
            status_code,
            elapsed_seconds,
        }
    }

    /// Find the value of one bucket line for the given route and `le`.
    fn bucket(snapshot: &str, route: &str, le: &str) -> Option<u64> {
        let route_label = format!("route=\"{}\"", route);
        let le_label = format!("le=\"{}\"", le);
        snapshot
            .lines()
            .filter(|l| l.starts_with("http_request_duration_seconds_bucket{"))
            .filter(|l| l.contains(&route_label) && l.contains(&le_label))
            .find_map(|l| l.rsplit(' ').next()?.parse().ok())
    }

    fn count(snapshot: &str, route: &str) -> Option<u64> {
        let route_label = format!("route=\"{}\"", route);
        snapshot
            .lines()
            .filter(|l| l.starts_with("http_request_duration_seconds_count"))
            .filter(|l| l.contains(&route_label))
            .find_map(|l| l.rsplit(' ').next()?.parse().ok())
    }

    #[test]
    fn test_small_observation_fills_every_bucket() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.observe(&observation("/a", 200, 0.05));
        let snap = recorder.snapshot();

        for le in ["0.1", "0.5", "1", "2", "3", "5", "10", "+Inf"] {
            assert_eq!(bucket(&snap, "/a", le), Some(1), "bucket le={}", le);
        }
        assert_eq!(count(&snap, "/a"), Some(1));
    }

    #[test]
    fn test_cumulative_bucket_counts() {
        let recorder = MetricsRecorder::new().unwrap();
        for elapsed in [0.05, 0.3, 4.0] {
            recorder.observe(&observation("/slow", 200, elapsed));
        }
        let snap = recorder.snapshot();

        assert_eq!(bucket(&snap, "/slow", "0.1"), Some(1));
        assert_eq!(bucket(&snap, "/slow", "0.5"), Some(2));
        assert_eq!(bucket(&snap, "/slow", "3"), Some(2));
        assert_eq!(bucket(&snap, "/slow", "5"), Some(3));
        assert_eq!(bucket(&snap, "/slow", "10"), Some(3));
        assert_eq!(bucket(&snap, "/slow", "+Inf"), Some(3));
        assert_eq!(count(&snap, "/slow"), Some(3));
    }

    #[test]
    fn test_label_tuples_are_isolated() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.observe(&observation("/a", 200, 0.2));
        recorder.observe(&observation("/b", 500, 0.05));
        let snap = recorder.snapshot();

        assert_eq!(bucket(&snap, "/a", "0.1"), Some(0));
        assert_eq!(bucket(&snap, "/a", "0.5"), Some(1));
        assert_eq!(bucket(&snap, "/b", "0.1"), Some(1));
        assert!(snap.contains("status_code=\"500\""));
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let recorder = MetricsRecorder::new().unwrap();
        recorder.observe(&observation("/a", 200, 1.5));

        let first = recorder.snapshot();
        let second = recorder.snapshot();
        assert_eq!(bucket(&first, "/a", "2"), bucket(&second, "/a", "2"));
        assert_eq!(count(&first, "/a"), count(&second, "/a"));
        assert_eq!(count(&second, "/a"), Some(1));
    }

    #[test]
    fn test_recorders_do_not_share_state() {
        let one = MetricsRecorder::new().unwrap();
        let two = MetricsRecorder::new().unwrap();
        one.observe(&observation("/only-one", 200, 0.1));

        assert!(one.snapshot().contains("/only-one"));
        assert!(!two.snapshot().contains("/only-one"));
    }

    #[test]
    fn test_concurrent_observations_are_counted() {
        let recorder = std::sync::Arc::new(MetricsRecorder::new().unwrap());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        recorder.observe(&observation("/c", 200, 0.2));
                    }
                })
            })
            .collect();
        for t in threads {
            let _ = recorder.snapshot();
            t.join().unwrap();
        }

        let snap = recorder.snapshot();
        assert_eq!(count(&snap, "/c"), Some(2000));
        assert_eq!(bucket(&snap, "/c", "+Inf"), Some(2000));
    }

    #[test]
    fn test_upkeep_keeps_counts() {
        let recorder = MetricsRecorder::new().unwrap();
        for _ in 0..500 {
            recorder.observe(&observation("/u", 200, 0.3));
        }
        recorder.run_upkeep();
        recorder.observe(&observation("/u", 200, 2.5));
        recorder.run_upkeep();

        let snap = recorder.snapshot();
        assert_eq!(count(&snap, "/u"), Some(501));
        assert_eq!(bucket(&snap, "/u", "0.5"), Some(500));
        assert_eq!(bucket(&snap, "/u", "3"), Some(501));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upkeep_task_preserves_observations() {
        let recorder = Arc::new(MetricsRecorder::new().unwrap());
        let upkeep = recorder.spawn_upkeep(Duration::from_secs(5));

        recorder.observe(&observation("/idle", 200, 0.2));
        tokio::time::sleep(Duration::from_secs(6)).await;
        recorder.observe(&observation("/idle", 200, 0.2));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count(&recorder.snapshot(), "/idle"), Some(2));
        upkeep.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_upkeep_task_stops_with_recorder() {
        let recorder = Arc::new(MetricsRecorder::new().unwrap());
        let upkeep = recorder.spawn_upkeep(Duration::from_secs(1));
        drop(recorder);

        tokio::time::timeout(Duration::from_secs(10), upkeep)
            .await
            .expect("upkeep task outlived its recorder")
            .unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_snapshot_includes_process_metrics() {
        let recorder = MetricsRecorder::new().unwrap();
        let snap = recorder.snapshot();

        for name in [
            PROCESS_START_TIME,
            "process_cpu_seconds_total",
            "process_resident_memory_bytes",
            "process_open_fds",
            "process_threads",
        ] {
            assert!(snap.contains(name), "missing {}", name);
        }

        let resident: f64 = snap
            .lines()
            .find(|l| l.starts_with("process_resident_memory_bytes "))
            .and_then(|l| l.rsplit(' ').next()?.parse().ok())
            .unwrap();
        assert!(resident > 0.0);
    }
}
