//! Fleet-wide heartbeat observation.

use dispatch_core::{HeartbeatUpdate, Queue, QueueError};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

/// Receives every heartbeat from the fleet, unfiltered.
pub trait HeartbeatHandler: Send + Sync {
    fn on_heartbeat(&self, heartbeat: &HeartbeatUpdate);
}

impl<F> HeartbeatHandler for F
where
    F: Fn(&HeartbeatUpdate) + Send + Sync,
{
    fn on_heartbeat(&self, heartbeat: &HeartbeatUpdate) {
        self(heartbeat)
    }
}

/// Subscribes once to the heartbeat stream and forwards every event.
///
/// There is no deduplication or staleness detection. The watcher is not
/// restarted when the stream terminates; that is left to whoever supervises
/// the process.
pub struct HeartbeatWatcher {
    queue: Arc<dyn Queue>,
    handler: Arc<dyn HeartbeatHandler>,
}

impl HeartbeatWatcher {
    pub fn new(queue: Arc<dyn Queue>, handler: Arc<dyn HeartbeatHandler>) -> Self {
        HeartbeatWatcher { queue, handler }
    }

    /// Runs for as long as the stream stays open. Returning at all means the
    /// stream failed or closed, which is always reported as an error.
    pub async fn run(self) -> Result<(), QueueError> {
        info!("Monitoring worker heartbeats");
        let mut stream = self.queue.monitor_heartbeats();
        let mut received: u64 = 0;

        while let Some(item) = stream.next().await {
            match item {
                Ok(heartbeat) => {
                    received += 1;
                    self.handler.on_heartbeat(&heartbeat);
                }
                Err(e) => {
                    error!(received, "Heartbeat stream failed: {}", e);
                    return Err(e);
                }
            }
        }

        error!(received, "Heartbeat stream closed");
        Err(QueueError::StreamClosed("heartbeat stream ended".to_string()))
    }
}
