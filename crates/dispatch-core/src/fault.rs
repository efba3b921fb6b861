use crate::SimulatedFault;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chance of an injected failure per submission attempt.
pub const DEFAULT_FAULT_PROBABILITY: f64 = 0.2;

/// Randomly fails submission attempts to exercise the retry path.
///
/// Not tied to any real network condition.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    probability: f64,
    rng: StdRng,
}

impl FaultInjector {
    pub fn new(probability: f64) -> Self {
        FaultInjector {
            probability: clamp_probability(probability),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(probability: f64, seed: u64) -> Self {
        FaultInjector {
            probability: clamp_probability(probability),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Never fails.
    pub fn disabled() -> Self {
        Self::new(0.0)
    }

    /// Fails every attempt.
    pub fn always() -> Self {
        Self::new(1.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn maybe_fail(&mut self) -> Result<(), SimulatedFault> {
        if self.rng.gen_bool(self.probability) {
            Err(SimulatedFault)
        } else {
            Ok(())
        }
    }
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new(DEFAULT_FAULT_PROBABILITY)
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
