//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign / propagate request ID)
//!     → observability::observer (timer starts)
//!     → handlers.rs (health, slow, metrics, fallback)
//!     → response.rs (JSON bodies, error → status mapping)
//!     → Send to client, timer drops
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
