use crate::TaskHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported by the queue for one task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Queued,
    Processing,
    Success,
    Failed,
    /// Any status the queue reports that this client does not model.
    Other(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Other(s) => s,
        }
    }

    /// `success` and `failed` end a task's status stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }
}

impl From<&str> for TaskState {
    fn from(s: &str) -> Self {
        match s {
            "queued" => TaskState::Queued,
            "processing" => TaskState::Processing,
            "success" => TaskState::Success,
            "failed" => TaskState::Failed,
            other => TaskState::Other(other.to_string()),
        }
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        TaskState::from(s.as_str())
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status change delivered on a task's status stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub task_id: TaskHandle,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatusUpdate {
    pub fn new(task_id: TaskHandle, status: impl Into<TaskState>) -> Self {
        TaskStatusUpdate {
            task_id,
            status: status.into(),
            result: None,
            error: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<serde_json::Value>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Liveness and workload report from one worker in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatUpdate {
    pub worker_id: String,
    pub status: String,
    pub task_count: u32,
    pub timestamp: DateTime<Utc>,
}
