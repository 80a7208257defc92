//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for local output
//! - Define the structured `LogRecord` emitted at request lifecycle points
//! - Abstract delivery behind the `LogSink` trait
//!
//! # Design Decisions
//! - Uses tracing crate for local structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and `RUST_LOG`
//! - Sinks are fire-and-forget: `append` never fails and never blocks on I/O

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Current UTC time as ISO-8601 with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A structured key-value record with a level and message.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: timestamp(),
            fields: Map::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Attach a field. Later values overwrite earlier ones with the same key.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Destination for structured records.
///
/// Implementations own delivery, buffering and retry. `append` must return
/// promptly even when the destination is unreachable.
pub trait LogSink: Send + Sync {
    fn append(&self, record: LogRecord);
}

pub type SharedSink = Arc<dyn LogSink>;

/// Forwards records into the local `tracing` subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&self, record: LogRecord) {
        let fields = Value::Object(record.fields);
        match record.level {
            LogLevel::Debug => tracing::debug!(fields = %fields, "{}", record.message),
            LogLevel::Info => tracing::info!(fields = %fields, "{}", record.message),
            LogLevel::Warn => tracing::warn!(fields = %fields, "{}", record.message),
            LogLevel::Error => tracing::error!(fields = %fields, "{}", record.message),
        }
    }
}

/// Delivers every record to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: SharedSink) {
        self.sinks.push(sink);
    }
}

impl LogSink for FanoutSink {
    fn append(&self, record: LogRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.append(record.clone());
            }
            last.append(record);
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("latency_lab={0},tower_http={0}", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<LogRecord>>);

    impl LogSink for Capture {
        fn append(&self, record: LogRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = LogRecord::info("Request completed")
            .with("status_code", 200)
            .with("route", "/slow");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["level"], "info");
        assert_eq!(json["message"], "Request completed");
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["route"], "/slow");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_fanout_delivers_to_all() {
        let a = Arc::new(Capture::default());
        let b = Arc::new(Capture::default());
        let fanout = FanoutSink::new(vec![a.clone() as SharedSink, b.clone() as SharedSink]);

        fanout.append(LogRecord::warn("hello").with("k", "v"));

        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap()[0].field("k"), Some(&Value::from("v")));
    }

    #[test]
    fn test_empty_fanout_is_noop() {
        FanoutSink::default().append(LogRecord::error("dropped"));
    }
}
