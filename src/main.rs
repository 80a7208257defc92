//! Latency lab server binary.
//!
//! Configuration precedence: command-line flags and environment variables
//! (`PORT`, `APP_ENV`, `LOG_SINK_ADDR`) override the optional TOML file,
//! which overrides built-in defaults.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use latency_lab::config::{load_config, validate_config, ConfigError, ServerConfig};
use latency_lab::http::{AppState, HttpServer};
use latency_lab::lifecycle::Shutdown;
use latency_lab::observability::{init_tracing, FanoutSink, RemoteSink, SharedSink, TracingSink};

#[derive(Parser, Debug)]
#[command(name = "latency-lab", about = "Demo server with a slow, flaky endpoint", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Deployment label shown in startup logs.
    #[arg(long, env = "APP_ENV")]
    environment: Option<String>,

    /// TCP address of a remote log collector (host:port).
    #[arg(long, env = "LOG_SINK_ADDR")]
    remote_log: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(addr) = self.remote_log {
            config.observability.remote_log_address = Some(addr);
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    init_tracing(&config.observability);

    tracing::info!("latency-lab v{} starting", env!("CARGO_PKG_VERSION"));

    let local: SharedSink = Arc::new(TracingSink);
    let mut sink = FanoutSink::new(vec![local]);
    if let Some(addr) = &config.observability.remote_log_address {
        tracing::info!(address = %addr, "Shipping logs to remote collector");
        sink.push(Arc::new(RemoteSink::spawn(
            addr.clone(),
            config.observability.remote_log_capacity,
        )));
    }
    let sink: SharedSink = Arc::new(sink);

    let state = AppState::from_config(&config, sink)?;

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        environment = %config.environment,
        min_delay_ms = config.simulator.min_delay_ms,
        max_delay_ms = config.simulator.max_delay_ms,
        failure_probability = config.simulator.failure_probability,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(config.listener.bind_address()).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, state);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
