//! Response bodies and error mapping.
//!
//! # Responsibilities
//! - Define the JSON bodies returned by every endpoint
//! - Map request failures to HTTP status codes
//! - Keep internal error details out of response bodies
//!
//! # Design Decisions
//! - JSON keys are camelCase to match the public contract
//! - Simulated failures carry their own message; everything unexpected
//!   collapses to "Internal server error"

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::observability::{timestamp, LogRecord, SharedSink};

pub const NOT_FOUND_MESSAGE: &str = "Endpoint not found";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub uptime: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlowSuccessBody {
    pub status: &'static str,
    pub message: &'static str,
    pub simulated_time: u64,
    pub actual_time: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<u64>,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            actual_time: None,
            timestamp: timestamp(),
        }
    }
}

/// Failures a handler can turn into a response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transient failure produced by the latency simulator.
    #[error("{message}")]
    SimulatedFailure { message: String, actual_ms: u64 },

    /// No handler matches the request.
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,

    /// Anything else; the detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SimulatedFailure { .. } | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::SimulatedFailure { message, actual_ms } => ErrorBody {
                actual_time: Some(actual_ms),
                ..ErrorBody::new(message)
            },
            ApiError::NotFound => ErrorBody::new(NOT_FOUND_MESSAGE),
            ApiError::Internal(_) => ErrorBody::new(INTERNAL_ERROR_MESSAGE),
        };
        (status, Json(body)).into_response()
    }
}

/// Turn a caught handler panic into the generic 500 response.
pub fn panic_response(sink: &SharedSink, panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    sink.append(LogRecord::error("Unhandled error").with("error", detail.as_str()));
    ApiError::Internal(detail).into_response()
}
