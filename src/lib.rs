//! Latency lab: a demo HTTP server with an artificially slow, randomly
//! failing endpoint and request-timing instrumentation.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request ID ─▶ observer (timer) ─▶ panic guard ─▶ handler
//!                                        │                              │
//!                                        │                    GET /slow │
//!                                        │                              ▼
//!                                        │                    ┌──────────────────┐
//!                                        │                    │ LatencySimulator │
//!                                        │                    └──────────────────┘
//!     Client Response                    ▼
//!     ◀────────────── body written ─▶ timer drops ─▶ MetricsRecorder + LogSink
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod simulator;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
