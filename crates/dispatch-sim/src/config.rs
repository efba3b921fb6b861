use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of simulated workers
    pub workers: usize,
    pub heartbeat_interval_ms: u64,
    /// Time a task spends queued before a worker picks it up
    pub pickup_delay_ms: u64,
    pub min_processing_ms: u64,
    pub max_processing_ms: u64,
    /// How long finished tasks stay queryable
    pub retention_ms: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            workers: 3,
            heartbeat_interval_ms: 5000,
            pickup_delay_ms: 500,
            min_processing_ms: 1000,
            max_processing_ms: 5000,
            retention_ms: 60_000,
        }
    }
}

impl SimConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn pickup_delay(&self) -> Duration {
        Duration::from_millis(self.pickup_delay_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }
}
