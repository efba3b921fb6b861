//! Starts the background activities and keeps the process alive.

use crate::heartbeat::HeartbeatWatcher;
use crate::producer::ProducerLoop;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Owns the producer loop and the heartbeat watcher.
///
/// Both run as independent tasks in a [`JoinSet`]; [`Orchestrator::start`]
/// only spawns them and returns immediately.
pub struct Orchestrator {
    activities: JoinSet<()>,
    park_interval: Duration,
}

impl Orchestrator {
    pub fn new(park_interval: Duration) -> Self {
        Orchestrator {
            activities: JoinSet::new(),
            park_interval,
        }
    }

    /// Spawn the producer loop and the heartbeat watcher. Must be called from
    /// within a tokio runtime.
    pub fn start(&mut self, producer: ProducerLoop, heartbeats: HeartbeatWatcher) {
        self.activities.spawn(async move {
            info!("Starting continuous task production");
            producer.run().await;
        });

        self.activities.spawn(async move {
            if let Err(e) = heartbeats.run().await {
                error!("Heartbeat watcher stopped: {}", e);
            }
        });
    }

    /// Number of activities that have not finished yet.
    pub fn active(&self) -> usize {
        self.activities.len()
    }

    /// Idle on a fixed interval until `shutdown` resolves.
    ///
    /// Activities that end on their own are reaped and logged but never
    /// restarted.
    pub async fn park_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.park_interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return;
                }
                _ = ticker.tick() => self.reap(),
            }
        }
    }

    /// Abort every activity and wait for them to unwind.
    pub async fn shutdown(mut self) {
        self.activities.abort_all();
        while self.activities.join_next().await.is_some() {}
        info!("All activities stopped");
    }

    fn reap(&mut self) {
        while let Some(finished) = self.activities.try_join_next() {
            match finished {
                Ok(()) => warn!("Background activity finished"),
                Err(e) if e.is_panic() => error!("Background activity panicked: {}", e),
                Err(e) => warn!("Background activity cancelled: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatHandler;
    use crate::report::{ConsoleReporter, MemorySink};
    use crate::submitter::Submitter;
    use crate::watcher::TaskWatchers;
    use chrono::Utc;
    use dispatch_core::{FaultInjector, HeartbeatUpdate, Queue};
    use dispatch_sim::ScriptedQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn activities(
        queue: &ScriptedQueue,
        beats: Arc<AtomicUsize>,
    ) -> (ProducerLoop, HeartbeatWatcher) {
        let queue: Arc<dyn Queue> = Arc::new(queue.clone());
        let reporter = ConsoleReporter::new(Arc::new(MemorySink::new()));
        let watchers = TaskWatchers::new(queue.clone(), Arc::new(reporter.clone()));
        let submitter = Submitter::new(queue.clone(), watchers, reporter)
            .with_faults(FaultInjector::disabled());
        let producer = ProducerLoop::new(submitter, Duration::from_secs(1));

        let handler: Arc<dyn HeartbeatHandler> = Arc::new(move |_: &HeartbeatUpdate| {
            beats.fetch_add(1, Ordering::SeqCst);
        });
        (producer, HeartbeatWatcher::new(queue, handler))
    }

    fn beat(n: u32) -> HeartbeatUpdate {
        HeartbeatUpdate {
            worker_id: format!("worker-{n}"),
            status: "active".to_string(),
            task_count: n,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_returns_immediately_and_both_run() {
        let queue = ScriptedQueue::new();
        queue.script_heartbeats((0..5).map(beat).collect(), true);
        let beats = Arc::new(AtomicUsize::new(0));
        let (producer, heartbeats) = activities(&queue, beats.clone());

        let mut orchestrator = Orchestrator::new(Duration::from_secs(1));
        let before = tokio::time::Instant::now();
        orchestrator.start(producer, heartbeats);
        assert_eq!(tokio::time::Instant::now(), before);
        assert_eq!(orchestrator.active(), 2);

        orchestrator
            .park_until(tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert!(queue.sends().len() >= 60 / 8);
        assert_eq!(beats.load(Ordering::SeqCst), 5);
        assert_eq!(orchestrator.active(), 2);

        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_heartbeat_stream_is_not_restarted() {
        let queue = ScriptedQueue::new();
        queue.script_heartbeats(vec![beat(1)], false);
        let beats = Arc::new(AtomicUsize::new(0));
        let (producer, heartbeats) = activities(&queue, beats.clone());

        let mut orchestrator = Orchestrator::new(Duration::from_secs(1));
        orchestrator.start(producer, heartbeats);
        orchestrator
            .park_until(tokio::time::sleep(Duration::from_secs(10)))
            .await;

        // Producer keeps going on its own
        assert_eq!(orchestrator.active(), 1);
        assert_eq!(beats.load(Ordering::SeqCst), 1);
        assert_eq!(queue.heartbeat_subscriptions(), 1);

        orchestrator.shutdown().await;
    }
}
