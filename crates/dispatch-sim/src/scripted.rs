use async_trait::async_trait;
use dispatch_core::{
    EmergencyTask, EmergencyType, HeartbeatStream, HeartbeatUpdate, Queue, QueueError,
    TaskHandle, TaskState, TaskStatusStream, TaskStatusUpdate,
};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

/// One call to [`Queue::send`] as seen by a [`ScriptedQueue`].
#[derive(Debug, Clone)]
pub struct SendRecord {
    pub task_type: EmergencyType,
    pub payload: EmergencyTask,
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    send_results: VecDeque<Result<TaskHandle, QueueError>>,
    task_streams: HashMap<TaskHandle, (Vec<TaskStatusUpdate>, bool)>,
    heartbeats: Option<(Vec<HeartbeatUpdate>, bool)>,
    issued: HashSet<TaskHandle>,
    sends: Vec<SendRecord>,
    monitored: Vec<TaskHandle>,
    heartbeat_subscriptions: usize,
}

/// Queue that replays canned responses and records every call.
///
/// - `send` pops the next scripted result, or issues a fresh handle once the
///   script is empty.
/// - `monitor_task` replays the updates scripted for the handle. Handles the
///   queue issued itself without a script get a single `success` update;
///   anything else yields [`QueueError::UnknownTask`].
/// - `monitor_heartbeats` replays the scripted heartbeats, or stays silent.
///
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedQueue {
    script: Arc<Mutex<Script>>,
}

impl ScriptedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_send(&self, result: Result<TaskHandle, QueueError>) {
        self.script.lock().send_results.push_back(result);
    }

    /// The next `count` sends fail with `error`.
    pub fn fail_sends(&self, count: usize, error: QueueError) {
        let mut script = self.script.lock();
        for _ in 0..count {
            script.send_results.push_back(Err(error.clone()));
        }
    }

    /// Status stream that closes after `updates`.
    pub fn script_task(&self, task_id: impl Into<TaskHandle>, updates: Vec<TaskStatusUpdate>) {
        self.script
            .lock()
            .task_streams
            .insert(task_id.into(), (updates, false));
    }

    /// Status stream that stays open after `updates`.
    pub fn script_open_task(
        &self,
        task_id: impl Into<TaskHandle>,
        updates: Vec<TaskStatusUpdate>,
    ) {
        self.script
            .lock()
            .task_streams
            .insert(task_id.into(), (updates, true));
    }

    pub fn script_heartbeats(&self, heartbeats: Vec<HeartbeatUpdate>, keep_open: bool) {
        self.script.lock().heartbeats = Some((heartbeats, keep_open));
    }

    pub fn sends(&self) -> Vec<SendRecord> {
        self.script.lock().sends.clone()
    }

    /// Handles passed to `monitor_task`, in call order.
    pub fn monitored(&self) -> Vec<TaskHandle> {
        self.script.lock().monitored.clone()
    }

    pub fn heartbeat_subscriptions(&self) -> usize {
        self.script.lock().heartbeat_subscriptions
    }
}

fn replay<T: Send + 'static>(
    items: Vec<T>,
    keep_open: bool,
) -> stream::BoxStream<'static, Result<T, QueueError>> {
    let replayed = stream::iter(items.into_iter().map(Ok));
    if keep_open {
        replayed.chain(stream::pending()).boxed()
    } else {
        replayed.boxed()
    }
}

#[async_trait]
impl Queue for ScriptedQueue {
    async fn send(
        &self,
        task_type: EmergencyType,
        payload: &EmergencyTask,
    ) -> Result<TaskHandle, QueueError> {
        let mut script = self.script.lock();
        script.sends.push(SendRecord {
            task_type,
            payload: *payload,
            at: Instant::now(),
        });

        let result = script
            .send_results
            .pop_front()
            .unwrap_or_else(|| Ok(TaskHandle::generate()));
        if let Ok(task_id) = &result {
            script.issued.insert(task_id.clone());
        }
        result
    }

    fn monitor_task(&self, task_id: &TaskHandle) -> TaskStatusStream {
        let mut script = self.script.lock();
        script.monitored.push(task_id.clone());

        if let Some((updates, keep_open)) = script.task_streams.get(task_id) {
            return replay(updates.clone(), *keep_open);
        }
        if script.issued.contains(task_id) {
            let done = TaskStatusUpdate::new(task_id.clone(), TaskState::Success);
            return replay(vec![done], false);
        }
        stream::iter(vec![Err(QueueError::UnknownTask(task_id.clone()))]).boxed()
    }

    fn monitor_heartbeats(&self) -> HeartbeatStream {
        let mut script = self.script.lock();
        script.heartbeat_subscriptions += 1;

        match &script.heartbeats {
            Some((heartbeats, keep_open)) => replay(heartbeats.clone(), *keep_open),
            None => stream::pending().boxed(),
        }
    }
}
