//! Human-readable progress output.

use crate::heartbeat::HeartbeatHandler;
use crate::watcher::StatusHandler;
use chrono::Local;
use dispatch_core::{HeartbeatUpdate, SubmitError, TaskHandle, TaskStatusUpdate};
use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for progress lines.
pub trait OutputSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes every line to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, line: &str) {
        println!("{}", line);
    }
}

/// Collects lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.lock().iter().any(|l| l == line)
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Formats submission progress, status updates and heartbeats.
#[derive(Clone)]
pub struct ConsoleReporter {
    sink: Arc<dyn OutputSink>,
}

impl ConsoleReporter {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        ConsoleReporter { sink }
    }

    pub fn stdout() -> Self {
        Self::new(Arc::new(StdoutSink))
    }

    pub fn submitted(&self, task_id: &TaskHandle) {
        self.sink.emit(&format!("Task submitted: {}", task_id));
    }

    pub fn submit_failed(&self, error: &SubmitError) {
        self.sink.emit(&format!("Error submitting task: {}", error));
    }

    pub fn retrying(&self, attempt: u32, max_attempts: u32) {
        self.sink
            .emit(&format!("Retrying... (Attempt {}/{})", attempt, max_attempts));
    }

    pub fn exhausted(&self, max_attempts: u32) {
        self.sink.emit(&format!(
            "Failed to submit task after {} attempts.",
            max_attempts
        ));
    }

    fn emit_all(&self, lines: Vec<String>) {
        for line in lines {
            self.sink.emit(&line);
        }
    }
}

impl StatusHandler for ConsoleReporter {
    fn on_update(&self, task_id: &TaskHandle, update: &TaskStatusUpdate) {
        self.emit_all(format_status(task_id, update));
    }
}

impl HeartbeatHandler for ConsoleReporter {
    fn on_heartbeat(&self, heartbeat: &HeartbeatUpdate) {
        self.emit_all(format_heartbeat(heartbeat));
    }
}

/// Lines printed for one status change. Terminal statuses also print the
/// result and error when the queue supplied them.
pub fn format_status(task_id: &TaskHandle, update: &TaskStatusUpdate) -> Vec<String> {
    let mut lines = vec![format!("Task {} status: {}", task_id, update.status)];

    if update.is_terminal() {
        if let Some(result) = &update.result {
            let rendered = match result {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("Result: {}", rendered));
        }
        if let Some(error) = &update.error {
            lines.push(format!("Error: {}", error));
        }
    }

    lines
}

pub fn format_heartbeat(heartbeat: &HeartbeatUpdate) -> Vec<String> {
    let timestamp = heartbeat
        .timestamp
        .with_timezone(&Local)
        .format("%a %b %e %H:%M:%S %Y");

    vec![
        format!("Heartbeat received from worker {}:", heartbeat.worker_id),
        format!("  Status: {}", heartbeat.status),
        format!("  Task count: {}", heartbeat.task_count),
        format!("  Timestamp: {}", timestamp),
        String::new(),
    ]
}
