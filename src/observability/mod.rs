//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request:
//!     → observer.rs (timer starts, "request received")
//!     → handler runs
//!     → response body dropped by the server
//!     → observer.rs (timer drops)
//!         → metrics.rs (histogram observation)
//!         → logging.rs ("request completed" record → LogSink)
//!
//! Consumers:
//!     → GET /metrics (Prometheus scrape of metrics.rs snapshot)
//!     → tracing subscriber (stdout, pretty or JSON)
//!     → remote.rs (newline-delimited JSON over TCP)
//! ```
//!
//! # Design Decisions
//! - Metrics state is an owned value passed through `AppState`, not a global
//! - Log delivery is abstracted behind `LogSink`; transports never fail a request
//! - Request ID flows into every lifecycle record

pub mod logging;
pub mod metrics;
pub mod observer;
pub mod remote;

pub use logging::{init_tracing, timestamp, FanoutSink, LogLevel, LogRecord, LogSink, SharedSink, TracingSink};
pub use metrics::{MetricsRecorder, TimingObservation};
pub use observer::{observe_requests, RequestObserver, RequestTimer};
pub use remote::RemoteSink;
