//! Per-task status watchers.
//!
//! Every successfully submitted task gets its own watcher, spawned onto a
//! shared [`TaskTracker`] and recorded in a [`WatcherRegistry`] until the
//! task reaches a terminal status or its stream ends.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dispatch_core::{Queue, QueueError, TaskHandle, TaskState, TaskStatusUpdate};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Receives every status change of a watched task.
///
/// Implementations must not panic and should return promptly; errors inside
/// the handler are its own concern.
pub trait StatusHandler: Send + Sync {
    fn on_update(&self, task_id: &TaskHandle, update: &TaskStatusUpdate);
}

impl<F> StatusHandler for F
where
    F: Fn(&TaskHandle, &TaskStatusUpdate) + Send + Sync,
{
    fn on_update(&self, task_id: &TaskHandle, update: &TaskStatusUpdate) {
        self(task_id, update)
    }
}

/// How a watcher finished.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// A terminal status was delivered
    Terminal(TaskState),
    /// The queue closed the stream before a terminal status
    StreamEnded,
    /// The stream reported an error
    StreamError(QueueError),
}

/// Bookkeeping for one in-flight watcher.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub started_at: DateTime<Utc>,
    pub last_status: Option<TaskState>,
}

/// Concurrent registry of in-flight watchers keyed by task handle.
#[derive(Debug, Clone, Default)]
pub struct WatcherRegistry {
    entries: Arc<DashMap<TaskHandle, WatchEntry>>,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a watcher. Returns false if one already exists for the handle.
    pub fn insert(&self, task_id: TaskHandle) -> bool {
        match self.entries.entry(task_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(WatchEntry {
                    started_at: Utc::now(),
                    last_status: None,
                });
                true
            }
        }
    }

    pub fn record(&self, task_id: &TaskHandle, status: &TaskState) {
        if let Some(mut entry) = self.entries.get_mut(task_id) {
            entry.last_status = Some(status.clone());
        }
    }

    pub fn remove(&self, task_id: &TaskHandle) -> Option<WatchEntry> {
        self.entries.remove(task_id).map(|(_, entry)| entry)
    }

    pub fn get(&self, task_id: &TaskHandle) -> Option<WatchEntry> {
        self.entries.get(task_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, task_id: &TaskHandle) -> bool {
        self.entries.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> Vec<TaskHandle> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Observes the status stream of a single task.
pub struct TaskWatcher {
    queue: Arc<dyn Queue>,
    handler: Arc<dyn StatusHandler>,
    registry: Option<WatcherRegistry>,
}

impl TaskWatcher {
    pub fn new(queue: Arc<dyn Queue>, handler: Arc<dyn StatusHandler>) -> Self {
        TaskWatcher {
            queue,
            handler,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: WatcherRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Forward updates until a terminal status, then drop the stream.
    ///
    /// Waits indefinitely if the queue never reports a terminal status.
    pub async fn watch(&self, task_id: &TaskHandle) -> WatchOutcome {
        let mut stream = self.queue.monitor_task(task_id);

        while let Some(item) = stream.next().await {
            match item {
                Ok(update) => {
                    debug!(task_id = %task_id, status = %update.status, "Status update");
                    if let Some(registry) = &self.registry {
                        registry.record(task_id, &update.status);
                    }
                    self.handler.on_update(task_id, &update);

                    if update.is_terminal() {
                        return WatchOutcome::Terminal(update.status);
                    }
                }
                Err(e) => {
                    warn!(task_id = %task_id, "Status stream failed: {}", e);
                    return WatchOutcome::StreamError(e);
                }
            }
        }

        warn!(task_id = %task_id, "Status stream ended before a terminal status");
        WatchOutcome::StreamEnded
    }
}

/// Spawns one watcher per submitted task.
#[derive(Clone)]
pub struct TaskWatchers {
    queue: Arc<dyn Queue>,
    handler: Arc<dyn StatusHandler>,
    registry: WatcherRegistry,
    tracker: TaskTracker,
}

impl TaskWatchers {
    pub fn new(queue: Arc<dyn Queue>, handler: Arc<dyn StatusHandler>) -> Self {
        TaskWatchers {
            queue,
            handler,
            registry: WatcherRegistry::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Start watching `task_id` in the background. Returns false if the
    /// handle is already being watched.
    pub fn spawn(&self, task_id: TaskHandle) -> bool {
        if !self.registry.insert(task_id.clone()) {
            warn!(task_id = %task_id, "Task is already being watched");
            return false;
        }

        let watcher = TaskWatcher::new(self.queue.clone(), self.handler.clone())
            .with_registry(self.registry.clone());
        let registry = self.registry.clone();

        self.tracker.spawn(async move {
            let outcome = watcher.watch(&task_id).await;
            registry.remove(&task_id);
            info!(task_id = %task_id, ?outcome, "Watcher finished");
        });

        true
    }

    pub fn registry(&self) -> &WatcherRegistry {
        &self.registry
    }

    /// Number of watchers still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every watcher spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_sim::ScriptedQueue;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn update(id: &str, status: &str) -> TaskStatusUpdate {
        TaskStatusUpdate::new(TaskHandle::new(id), status)
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn StatusHandler>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn StatusHandler> =
            Arc::new(move |_: &TaskHandle, update: &TaskStatusUpdate| {
                sink.lock().push(update.status.to_string());
            });
        (seen, handler)
    }

    #[tokio::test]
    async fn test_stops_after_terminal_status() {
        let queue = ScriptedQueue::new();
        queue.script_task(
            "T1",
            vec![
                update("T1", "queued"),
                update("T1", "processing"),
                update("T1", "success"),
                update("T1", "failed"),
                update("T1", "processing"),
            ],
        );
        let (seen, handler) = recorder();

        let watcher = TaskWatcher::new(Arc::new(queue), handler);
        let outcome = watcher.watch(&TaskHandle::new("T1")).await;

        assert_eq!(outcome, WatchOutcome::Terminal(TaskState::Success));
        assert_eq!(*seen.lock(), vec!["queued", "processing", "success"]);
    }

    #[tokio::test]
    async fn test_stream_error_stops_watcher() {
        let queue = ScriptedQueue::new();
        let (seen, handler) = recorder();

        let watcher = TaskWatcher::new(Arc::new(queue), handler);
        let outcome = watcher.watch(&TaskHandle::new("missing")).await;

        assert_eq!(
            outcome,
            WatchOutcome::StreamError(QueueError::UnknownTask(TaskHandle::new("missing")))
        );
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal() {
        let queue = ScriptedQueue::new();
        queue.script_task("T3", vec![update("T3", "queued")]);
        let (seen, handler) = recorder();

        let watcher = TaskWatcher::new(Arc::new(queue), handler);
        let outcome = watcher.watch(&TaskHandle::new("T3")).await;

        assert_eq!(outcome, WatchOutcome::StreamEnded);
        assert_eq!(*seen.lock(), vec!["queued"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_terminal_stream_keeps_watcher_alive() {
        let queue = ScriptedQueue::new();
        queue.script_open_task("T4", vec![update("T4", "queued")]);
        let (seen, handler) = recorder();

        let watchers = TaskWatchers::new(Arc::new(queue), handler);
        assert!(watchers.spawn(TaskHandle::new("T4")));

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(watchers.in_flight(), 1);
        let entry = watchers.registry().get(&TaskHandle::new("T4")).unwrap();
        assert_eq!(entry.last_status, Some(TaskState::Queued));
        assert_eq!(*seen.lock(), vec!["queued"]);
    }

    #[tokio::test]
    async fn test_registry_entries_removed_on_completion() {
        let queue = ScriptedQueue::new();
        for id in ["A", "B", "C"] {
            queue.script_task(id, vec![update(id, "processing"), update(id, "failed")]);
        }
        let (seen, handler) = recorder();

        let watchers = TaskWatchers::new(Arc::new(queue), handler);
        for id in ["A", "B", "C"] {
            assert!(watchers.spawn(TaskHandle::new(id)));
        }

        watchers.wait_idle().await;

        assert!(watchers.registry().is_empty());
        assert_eq!(watchers.in_flight(), 0);
        assert_eq!(seen.lock().len(), 6);
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = WatcherRegistry::new();
        assert!(registry.insert(TaskHandle::new("T1")));
        assert!(!registry.insert(TaskHandle::new("T1")));
        assert_eq!(registry.len(), 1);

        registry.record(&TaskHandle::new("T1"), &TaskState::Processing);
        let entry = registry.remove(&TaskHandle::new("T1")).unwrap();
        assert_eq!(entry.last_status, Some(TaskState::Processing));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_concurrent_insert_and_remove() {
        let registry = WatcherRegistry::new();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let registry = registry.clone();
                scope.spawn(move || {
                    for i in 0..250 {
                        let handle = TaskHandle::new(format!("{t}-{i}"));
                        assert!(registry.insert(handle.clone()));
                        if i % 2 == 0 {
                            assert!(registry.remove(&handle).is_some());
                        }
                    }
                });
            }
        });

        assert_eq!(registry.len(), 8 * 125);
    }
}
