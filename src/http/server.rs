//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, request observer, panic recovery)
//! - Bind server to listener
//! - Keep the metrics buffer drained while the server runs
//! - Graceful shutdown on broadcast or OS signal

use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::BuildError;
use std::any::Any;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::{handlers, request, response};
use crate::lifecycle::{signals, startup};
use crate::observability::metrics::UPKEEP_INTERVAL;
use crate::observability::{observe_requests, MetricsRecorder, RequestObserver, SharedSink};
use crate::simulator::LatencySimulator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub simulator: Arc<LatencySimulator>,
    pub metrics: Arc<MetricsRecorder>,
    pub sink: SharedSink,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(simulator: LatencySimulator, metrics: MetricsRecorder, sink: SharedSink) -> Self {
        Self {
            simulator: Arc::new(simulator),
            metrics: Arc::new(metrics),
            sink,
            started_at: Instant::now(),
        }
    }

    /// Build state from configuration with an entropy-seeded simulator.
    pub fn from_config(config: &ServerConfig, sink: SharedSink) -> Result<Self, BuildError> {
        Ok(Self::new(
            LatencySimulator::new(config.simulator.clone()),
            MetricsRecorder::new()?,
            sink,
        ))
    }
}

/// HTTP server for the demo endpoints.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let router = Self::with_observability(Self::routes(), state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Routes without middleware. Unknown paths and methods fall through to 404.
    pub fn routes() -> Router<AppState> {
        Router::new()
            .route("/", get(handlers::health).fallback(handlers::not_found))
            .route("/slow", get(handlers::slow).fallback(handlers::not_found))
            .route(
                "/metrics",
                get(handlers::metrics_export).fallback(handlers::not_found),
            )
            .fallback(handlers::not_found)
    }

    /// Attach state and the middleware stack to `routes`.
    ///
    /// Layers run outermost first: request ID, trace, request-ID echo,
    /// observer, panic recovery. The observer sits outside panic recovery so
    /// it sees the final 500.
    pub fn with_observability(routes: Router<AppState>, state: AppState) -> Router {
        let observer = RequestObserver::new(state.metrics.clone(), state.sink.clone());
        let sink = state.sink.clone();

        routes
            .with_state(state)
            .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
                response::panic_response(&sink, panic)
            }))
            .layer(middleware::from_fn_with_state(observer, observe_requests))
            .layer(request::propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");
        startup::announce(&self.config, addr, self.state.sink.as_ref());
        let upkeep = self.state.metrics.spawn_upkeep(UPKEEP_INTERVAL);

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => tracing::info!("Shutdown requested"),
                    _ = signals::wait_for_termination() => {}
                }
            })
            .await;
        upkeep.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
