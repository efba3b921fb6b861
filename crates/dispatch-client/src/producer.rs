//! Continuous production loop.

use crate::submitter::{SubmitOutcome, Submitter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::debug;

/// Lower bound of the pause between cycles, in time units (inclusive).
pub const PAUSE_MIN_UNITS: f64 = 3.0;
/// Upper bound of the pause between cycles, in time units (exclusive).
pub const PAUSE_MAX_UNITS: f64 = 8.0;

/// Submits one task per cycle, then pauses for a random interval.
///
/// The pause is added on top of whatever backoff the submission needed.
pub struct ProducerLoop {
    submitter: Submitter,
    unit: Duration,
    rng: StdRng,
}

impl ProducerLoop {
    pub fn new(submitter: Submitter, unit: Duration) -> Self {
        ProducerLoop {
            submitter,
            unit,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn submitter(&self) -> &Submitter {
        &self.submitter
    }

    /// Pause before the next cycle, drawn uniformly from `[3, 8)` units.
    pub fn next_pause(&mut self) -> Duration {
        let units = self.rng.gen_range(PAUSE_MIN_UNITS..PAUSE_MAX_UNITS);
        self.unit.mul_f64(units)
    }

    /// One submission followed by the inter-cycle pause.
    pub async fn cycle(&mut self) -> SubmitOutcome {
        let outcome = self.submitter.submit_one().await;
        let pause = self.next_pause();
        debug!(?pause, "Waiting before next submission");
        tokio::time::sleep(pause).await;
        outcome
    }

    /// Produce forever.
    pub async fn run(mut self) {
        loop {
            self.cycle().await;
        }
    }
}
