use crate::{EmergencyTask, EmergencyType, HeartbeatUpdate, QueueError, TaskHandle, TaskStatusUpdate};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Status updates for a single task, in the order the queue emits them.
pub type TaskStatusStream = BoxStream<'static, Result<TaskStatusUpdate, QueueError>>;

/// Fleet-wide worker heartbeats.
pub type HeartbeatStream = BoxStream<'static, Result<HeartbeatUpdate, QueueError>>;

/// The distributed task queue as seen by the producer.
///
/// Implementations are shared as `Arc<dyn Queue>` across every concurrent
/// activity and are only ever called through `&self`.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Submit a task and return the handle the queue assigned to it.
    async fn send(
        &self,
        task_type: EmergencyType,
        payload: &EmergencyTask,
    ) -> Result<TaskHandle, QueueError>;

    /// Subscribe to the status stream of one task.
    fn monitor_task(&self, task_id: &TaskHandle) -> TaskStatusStream;

    /// Subscribe to heartbeats from every worker.
    fn monitor_heartbeats(&self) -> HeartbeatStream;
}
