//! Startup announcement.
//!
//! Emits the "server started" record once the listener is bound, including
//! the URLs of the public endpoints.

use std::net::SocketAddr;

use crate::config::ServerConfig;
use crate::observability::{LogRecord, LogSink};

/// Log that the server is accepting traffic on `addr`.
pub fn announce(config: &ServerConfig, addr: SocketAddr, sink: &dyn LogSink) {
    let base = format!("http://localhost:{}", addr.port());
    sink.append(
        LogRecord::info("Server started")
            .with("address", addr.to_string())
            .with("port", addr.port())
            .with("environment", config.environment.as_str())
            .with("health_url", format!("{}/", base))
            .with("slow_url", format!("{}/slow", base))
            .with("metrics_url", format!("{}/metrics", base)),
    );
}
