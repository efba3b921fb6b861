use dispatch_core::DEFAULT_FAULT_PROBABILITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Length of one time unit, in milliseconds. Backoff and pacing are
    /// expressed in these units.
    pub time_unit_ms: u64,
    /// Chance of an injected failure per submission attempt
    pub fault_probability: f64,
    /// Seed for task synthesis, fault injection and pacing
    pub seed: Option<u64>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        ProducerConfig {
            time_unit_ms: 1000,
            fault_probability: DEFAULT_FAULT_PROBABILITY,
            seed: None,
        }
    }
}

impl ProducerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ProducerConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms.max(1))
    }
}
