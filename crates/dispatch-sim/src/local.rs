//! In-process simulation of the distributed queue.
//!
//! Tasks go `queued -> processing -> success | failed`. Workers geofence
//! every task: anything outside the home region fails.

use crate::config::SimConfig;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dispatch_core::{
    EmergencyTask, EmergencyType, HeartbeatStream, HeartbeatUpdate, Queue, QueueError,
    TaskHandle, TaskState, TaskStatusStream, TaskStatusUpdate, HOME_REGION,
};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

const HEARTBEAT_CAPACITY: usize = 1024;
const OUT_OF_AREA: &str = "location outside service area";
const DISPATCHED: &str = "dispatched";

/// Status history and live subscribers of one task.
#[derive(Default)]
struct TaskRecord {
    history: Vec<TaskStatusUpdate>,
    subscribers: Vec<mpsc::UnboundedSender<TaskStatusUpdate>>,
}

type TaskTable = Arc<DashMap<TaskHandle, TaskRecord>>;

fn publish(tasks: &TaskTable, update: TaskStatusUpdate) {
    let Some(mut record) = tasks.get_mut(&update.task_id) else {
        return;
    };

    record
        .subscribers
        .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    if update.is_terminal() {
        // Closing the senders ends every subscriber's stream
        record.subscribers.clear();
    }
    record.history.push(update);
}

struct SimWorker {
    worker_id: String,
    active_tasks: RwLock<u32>,
}

impl SimWorker {
    fn new(worker_id: String) -> Self {
        SimWorker {
            worker_id,
            active_tasks: RwLock::new(0),
        }
    }

    fn heartbeat(&self) -> HeartbeatUpdate {
        HeartbeatUpdate {
            worker_id: self.worker_id.clone(),
            status: "active".to_string(),
            task_count: *self.active_tasks.read(),
            timestamp: Utc::now(),
        }
    }

    fn increment_active(&self) {
        *self.active_tasks.write() += 1;
    }

    fn decrement_active(&self) {
        let mut active = self.active_tasks.write();
        *active = active.saturating_sub(1);
    }
}

struct Inner {
    config: SimConfig,
    tasks: TaskTable,
    workers: Vec<Arc<SimWorker>>,
    next_worker: AtomicUsize,
    heartbeats: broadcast::Sender<HeartbeatUpdate>,
    background: Vec<AbortHandle>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for handle in &self.background {
            handle.abort();
        }
    }
}

/// Queue backed by a simulated worker fleet living in this process.
#[derive(Clone)]
pub struct LocalQueue {
    inner: Arc<Inner>,
}

impl LocalQueue {
    /// Create the fleet and start its heartbeat loops. Must be called from
    /// within a tokio runtime.
    pub fn start(config: SimConfig) -> Self {
        let (heartbeats, _) = broadcast::channel(HEARTBEAT_CAPACITY);
        let workers: Vec<_> = (1..=config.workers.max(1))
            .map(|n| Arc::new(SimWorker::new(format!("worker-{}", n))))
            .collect();

        let background = workers
            .iter()
            .map(|worker| {
                let worker = worker.clone();
                let sender = heartbeats.clone();
                let period = config.heartbeat_interval();

                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    loop {
                        interval.tick().await;
                        // No subscribers is fine
                        let _ = sender.send(worker.heartbeat());
                    }
                })
                .abort_handle()
            })
            .collect();

        info!(workers = workers.len(), "Simulated worker fleet started");

        LocalQueue {
            inner: Arc::new(Inner {
                config,
                tasks: Arc::new(DashMap::new()),
                workers,
                next_worker: AtomicUsize::new(0),
                heartbeats,
                background,
            }),
        }
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.inner
            .workers
            .iter()
            .map(|worker| worker.worker_id.clone())
            .collect()
    }

    /// Tasks still held by the queue (in flight or within retention).
    pub fn task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    fn next_worker(&self) -> Arc<SimWorker> {
        let n = self.inner.next_worker.fetch_add(1, Ordering::Relaxed);
        self.inner.workers[n % self.inner.workers.len()].clone()
    }

    fn processing_time(&self) -> Duration {
        let min = self.inner.config.min_processing_ms;
        let max = self.inner.config.max_processing_ms;
        let ms = if max > min {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        };
        Duration::from_millis(ms)
    }
}

#[async_trait]
impl Queue for LocalQueue {
    async fn send(
        &self,
        task_type: EmergencyType,
        payload: &EmergencyTask,
    ) -> Result<TaskHandle, QueueError> {
        let task_id = TaskHandle::generate();
        let tasks = self.inner.tasks.clone();
        tasks.insert(task_id.clone(), TaskRecord::default());
        publish(&tasks, TaskStatusUpdate::new(task_id.clone(), TaskState::Queued));

        let worker = self.next_worker();
        let pickup = self.inner.config.pickup_delay();
        let work = self.processing_time();
        let retention = self.inner.config.retention();
        let location = payload.location;
        let job_id = task_id.clone();

        debug!(
            task_id = %task_id,
            task_type = %task_type,
            worker_id = %worker.worker_id,
            "Task queued"
        );

        tokio::spawn(async move {
            tokio::time::sleep(pickup).await;

            worker.increment_active();
            publish(&tasks, TaskStatusUpdate::new(job_id.clone(), TaskState::Processing));
            tokio::time::sleep(work).await;

            let done = if HOME_REGION.contains(&location) {
                TaskStatusUpdate::new(job_id.clone(), TaskState::Success).with_result(DISPATCHED)
            } else {
                TaskStatusUpdate::new(job_id.clone(), TaskState::Failed).with_error(OUT_OF_AREA)
            };
            worker.decrement_active();
            publish(&tasks, done);

            tokio::time::sleep(retention).await;
            tasks.remove(&job_id);
        });

        Ok(task_id)
    }

    fn monitor_task(&self, task_id: &TaskHandle) -> TaskStatusStream {
        let Some(mut record) = self.inner.tasks.get_mut(task_id) else {
            return stream::iter(vec![Err(QueueError::UnknownTask(task_id.clone()))]).boxed();
        };

        let (tx, rx) = mpsc::unbounded_channel();
        for update in &record.history {
            let _ = tx.send(update.clone());
        }
        let finished = record.history.last().is_some_and(|u| u.is_terminal());
        if !finished {
            record.subscribers.push(tx);
        }

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|update| (Ok(update), rx))
        })
        .boxed()
    }

    fn monitor_heartbeats(&self) -> HeartbeatStream {
        let rx = self.inner.heartbeats.subscribe();

        stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(heartbeat) => return Some((Ok(heartbeat), rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Heartbeat subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{Location, Severity, TaskAttribute};

    fn fast_config() -> SimConfig {
        SimConfig {
            workers: 2,
            heartbeat_interval_ms: 1000,
            pickup_delay_ms: 100,
            min_processing_ms: 200,
            max_processing_ms: 400,
            retention_ms: 5000,
        }
    }

    fn task_at(lat: f64, lon: f64) -> EmergencyTask {
        EmergencyTask::new(
            Location::new(lat, lon),
            TaskAttribute::Severity(Severity::Severe),
        )
    }

    async fn statuses(queue: &LocalQueue, task_id: &TaskHandle) -> Vec<TaskStatusUpdate> {
        queue.monitor_task(task_id).map(|u| u.unwrap()).collect().await
    }

    #[tokio::test(start_paused = true)]
    async fn test_home_region_task_succeeds() {
        let queue = LocalQueue::start(fast_config());
        let task_id = queue
            .send(EmergencyType::Medical, &task_at(12.95, 77.6))
            .await
            .unwrap();

        let updates = statuses(&queue, &task_id).await;
        let states: Vec<_> = updates.iter().map(|u| u.status.clone()).collect();

        assert_eq!(
            states,
            vec![TaskState::Queued, TaskState::Processing, TaskState::Success]
        );
        assert_eq!(updates[2].result, Some(serde_json::json!("dispatched")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_region_task_fails_geofence() {
        let queue = LocalQueue::start(fast_config());
        let task_id = queue
            .send(EmergencyType::Medical, &task_at(11.0, 76.0))
            .await
            .unwrap();

        let updates = statuses(&queue, &task_id).await;
        let last = updates.last().unwrap();

        assert_eq!(last.status, TaskState::Failed);
        assert_eq!(last.error.as_deref(), Some(OUT_OF_AREA));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_subscriber_gets_full_history() {
        let queue = LocalQueue::start(fast_config());
        let task_id = queue
            .send(EmergencyType::Fire, &task_at(13.0, 77.55))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(statuses(&queue, &task_id).await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_tasks_expire() {
        let queue = LocalQueue::start(fast_config());
        let task_id = queue
            .send(EmergencyType::Police, &task_at(12.9, 77.6))
            .await
            .unwrap();
        assert_eq!(queue.task_count(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(queue.task_count(), 0);
        let mut stream = queue.monitor_task(&task_id);
        assert_eq!(
            stream.next().await,
            Some(Err(QueueError::UnknownTask(task_id)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_worker_sends_heartbeats() {
        let queue = LocalQueue::start(fast_config());
        let mut heartbeats = queue.monitor_heartbeats();

        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(heartbeats.next().await.unwrap().unwrap());
        }

        for worker_id in queue.worker_ids() {
            assert_eq!(seen.iter().filter(|hb| hb.worker_id == worker_id).count(), 3);
        }
        assert!(seen.iter().all(|hb| hb.status == "active"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_count_tracks_active_work() {
        let queue = LocalQueue::start(SimConfig {
            workers: 1,
            min_processing_ms: 2000,
            max_processing_ms: 3000,
            ..fast_config()
        });

        for _ in 0..3 {
            queue
                .send(EmergencyType::Medical, &task_at(12.95, 77.6))
                .await
                .unwrap();
        }

        // Picked up at 100ms, next heartbeat at 1s
        tokio::time::sleep(Duration::from_millis(150)).await;
        let busy = queue.monitor_heartbeats().next().await.unwrap().unwrap();
        assert_eq!(busy.task_count, 3);

        // All finished by 3.1s, next heartbeat at 5s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let idle = queue.monitor_heartbeats().next().await.unwrap().unwrap();
        assert_eq!(idle.task_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let queue = LocalQueue::start(fast_config());
        let mut stream = queue.monitor_task(&TaskHandle::new("nope"));
        assert!(matches!(
            stream.next().await,
            Some(Err(QueueError::UnknownTask(_)))
        ));
        assert!(stream.next().await.is_none());
    }
}
