//! Variable-latency, variable-failure simulated operation.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Outcome;

/// Message carried by every simulated failure.
pub const FAILURE_MESSAGE: &str = "Random server error occurred";

/// Tunables for the simulated operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Lower bound of the delay, inclusive.
    pub min_delay_ms: u64,

    /// Upper bound of the delay, inclusive.
    pub max_delay_ms: u64,

    /// Probability that an operation fails after its delay (0.0 to 1.0).
    pub failure_probability: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 500,
            max_delay_ms: 3000,
            failure_probability: 0.2,
        }
    }
}

/// Produces a randomized [`Outcome`] per call, suspending the caller for the drawn delay.
pub struct LatencySimulator {
    config: SimulatorConfig,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl LatencySimulator {
    /// Create a simulator seeded from OS entropy.
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a simulator drawing from the given random source.
    pub fn with_rng<R>(config: SimulatorConfig, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        Self {
            config,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Draw a delay uniformly from the configured closed range.
    pub fn draw_delay(&self) -> u64 {
        let mut rng = self.rng.lock().expect("simulator rng mutex poisoned");
        rng.gen_range(self.config.min_delay_ms..=self.config.max_delay_ms)
    }

    /// Draw whether an operation fails, independently of any delay drawn before it.
    pub fn draw_failure(&self) -> bool {
        let mut rng = self.rng.lock().expect("simulator rng mutex poisoned");
        rng.gen_bool(self.config.failure_probability)
    }

    /// Run one simulated operation.
    ///
    /// The failure decision is drawn only after the delay has elapsed. The
    /// sleep is not cancelled by client disconnects; it only stops if the
    /// caller's future is dropped, in which case no failure is drawn.
    pub async fn simulate(&self) -> Outcome {
        let delay_ms = self.draw_delay();

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if self.draw_failure() {
            Outcome::Failure {
                message: FAILURE_MESSAGE.to_string(),
            }
        } else {
            Outcome::Success { delay_ms }
        }
    }
}
