//! Request lifecycle measurement.
//!
//! # Responsibilities
//! - Start a timer when a request arrives
//! - Record exactly one histogram observation and one log record per request
//! - Capture the final status code, including one produced by error handling
//!
//! # Design Decisions
//! - `RequestTimer` is a drop guard: the measurement happens on every exit path
//! - The middleware moves the timer into the response body, so the measurement
//!   is taken once the server has finished writing (or abandoned) the body
//! - A timer dropped before a status was set is recorded as 499

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use http_body::{Body as _, Frame, SizeHint};
use std::sync::Arc;
use tokio::time::Instant;

use super::logging::{LogLevel, LogRecord, SharedSink};
use super::metrics::{MetricsRecorder, TimingObservation};

/// Status recorded when the client went away before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Hands out [`RequestTimer`]s wired to a metrics recorder and a log sink.
#[derive(Clone)]
pub struct RequestObserver {
    metrics: Arc<MetricsRecorder>,
    sink: SharedSink,
}

impl RequestObserver {
    pub fn new(metrics: Arc<MetricsRecorder>, sink: SharedSink) -> Self {
        Self { metrics, sink }
    }

    /// Log the incoming request and start timing it.
    pub fn begin(&self, method: &str, route: &str, request_id: Option<&str>) -> RequestTimer {
        let mut record = LogRecord::info("Request received")
            .with("method", method)
            .with("route", route);
        if let Some(id) = request_id {
            record = record.with("request_id", id);
        }
        self.sink.append(record);

        RequestTimer {
            observer: self.clone(),
            method: method.to_string(),
            route: route.to_string(),
            request_id: request_id.map(str::to_string),
            started: Instant::now(),
            status: None,
        }
    }
}

/// Scoped measurement of one request; finalized when dropped.
pub struct RequestTimer {
    observer: RequestObserver,
    method: String,
    route: String,
    request_id: Option<String>,
    started: Instant,
    status: Option<StatusCode>,
}

impl RequestTimer {
    /// Store the final status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let aborted = self.status.is_none();
        let status_code = self
            .status
            .map(|s| s.as_u16())
            .unwrap_or(CLIENT_CLOSED_REQUEST);

        let level = match status_code {
            500.. => LogLevel::Error,
            400.. => LogLevel::Warn,
            _ => LogLevel::Info,
        };
        let mut record = LogRecord::new(level, "Request completed")
            .with("method", self.method.as_str())
            .with("route", self.route.as_str())
            .with("status_code", status_code)
            .with("duration_ms", elapsed.as_secs_f64() * 1000.0);
        if let Some(id) = &self.request_id {
            record = record.with("request_id", id.as_str());
        }
        if aborted {
            record = record.with("aborted", true);
        }
        self.observer.sink.append(record);

        self.observer.metrics.observe(&TimingObservation {
            method: std::mem::take(&mut self.method),
            route: std::mem::take(&mut self.route),
            status_code,
            elapsed_seconds: elapsed.as_secs_f64(),
        });
    }
}

/// Response body that keeps the timer alive until the body is dropped.
///
/// Frames, trailers and the exact size hint pass through untouched, so the
/// server still sends `content-length` for fixed-size responses.
struct ObservedBody {
    inner: Body,
    _timer: RequestTimer,
}

impl http_body::Body for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Middleware timing every request that passes through it.
pub async fn observe_requests(
    State(observer): State<RequestObserver>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut timer = observer.begin(
        request.method().as_str(),
        request.uri().path(),
        request_id.as_deref(),
    );

    let response = next.run(request).await;
    timer.set_status(response.status());

    let (parts, body) = response.into_parts();
    let body = Body::new(ObservedBody {
        inner: body,
        _timer: timer,
    });
    Response::from_parts(parts, body)
}
