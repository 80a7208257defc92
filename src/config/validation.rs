//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (port, delay bounds, probabilities)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("listener.port must be non-zero")]
    ZeroPort,

    #[error("simulator.min_delay_ms ({min}) exceeds simulator.max_delay_ms ({max})")]
    DelayRange { min: u64, max: u64 },

    #[error("simulator.failure_probability must be within [0, 1], got {0}")]
    FailureProbability(f64),

    #[error("observability.log_level must not be empty")]
    EmptyLogLevel,

    #[error("observability.remote_log_capacity must be greater than zero")]
    ZeroRemoteCapacity,
}

/// Check every semantic constraint and report all violations.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    let sim = &config.simulator;
    if sim.min_delay_ms > sim.max_delay_ms {
        errors.push(ValidationError::DelayRange {
            min: sim.min_delay_ms,
            max: sim.max_delay_ms,
        });
    }
    if !(0.0..=1.0).contains(&sim.failure_probability) {
        errors.push(ValidationError::FailureProbability(sim.failure_probability));
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::EmptyLogLevel);
    }
    if config.observability.remote_log_capacity == 0 {
        errors.push(ValidationError::ZeroRemoteCapacity);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
