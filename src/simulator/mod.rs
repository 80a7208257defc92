//! Latency and failure simulation subsystem.
//!
//! # Data Flow
//! ```text
//! GET /slow
//!     → latency.rs (draw delay, sleep, then draw failure)
//!     → outcome.rs (Success { delay_ms } | Failure { message })
//!     → handler maps the outcome to a 200 or 500 response
//! ```
//!
//! # Design Decisions
//! - The random source is injected so tests can seed it
//! - Delay and failure are independent draws
//! - Failures are transient by nature; callers never treat them as fatal

pub mod latency;
pub mod outcome;

pub use latency::{LatencySimulator, SimulatorConfig, FAILURE_MESSAGE};
pub use outcome::Outcome;
