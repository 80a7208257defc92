//! Result of a single simulated operation.

/// Outcome of one [`LatencySimulator::simulate`](super::LatencySimulator::simulate) call.
///
/// Produced fresh per invocation and consumed immediately by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation finished after sleeping for `delay_ms`.
    Success { delay_ms: u64 },
    /// The operation hit a transient downstream error.
    Failure { message: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}
