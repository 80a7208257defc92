//! Endpoint handlers.
//!
//! | Method | Path     | Handler          |
//! |--------|----------|------------------|
//! | GET    | /        | `health`         |
//! | GET    | /slow    | `slow`           |
//! | GET    | /metrics | `metrics_export` |
//! | *      | *        | `not_found`      |

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use tokio::time::Instant;

use crate::http::response::{ApiError, HealthBody, SlowSuccessBody};
use crate::http::server::AppState;
use crate::observability::metrics::CONTENT_TYPE;
use crate::observability::observer::X_REQUEST_ID;
use crate::observability::{timestamp, LogRecord};
use crate::simulator::Outcome;

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

fn tagged(record: LogRecord, headers: &HeaderMap) -> LogRecord {
    match request_id(headers) {
        Some(id) => record.with("request_id", id),
        None => record,
    }
}

/// Liveness probe. Never fails and never touches the simulator.
pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        message: "Server is running properly",
        timestamp: timestamp(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

/// Run one simulated operation and report how long it took.
///
/// `actualTime` is measured here, independently of the simulator's drawn
/// delay, so scheduling jitter shows up in the response.
pub async fn slow(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SlowSuccessBody>, ApiError> {
    let start = Instant::now();
    state
        .sink
        .append(tagged(LogRecord::info("Starting slow operation"), &headers));

    let outcome = state.simulator.simulate().await;
    let actual_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Outcome::Success { delay_ms } => {
            state.sink.append(tagged(
                LogRecord::info("Slow operation completed")
                    .with("simulated_ms", delay_ms)
                    .with("actual_ms", actual_ms),
                &headers,
            ));
            Ok(Json(SlowSuccessBody {
                status: "success",
                message: "Operation completed successfully",
                simulated_time: delay_ms,
                actual_time: actual_ms,
                timestamp: timestamp(),
            }))
        }
        Outcome::Failure { message } => {
            state.sink.append(tagged(
                LogRecord::error("Slow operation failed")
                    .with("error", message.as_str())
                    .with("actual_ms", actual_ms),
                &headers,
            ));
            Err(ApiError::SimulatedFailure { message, actual_ms })
        }
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics_export(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics.snapshot())
}

/// Fallback for every unmatched method or path.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
