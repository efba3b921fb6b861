//! Dispatch Client
//!
//! Resilient submission of synthesized emergency tasks and concurrent
//! observation of their status and of the worker fleet.

pub mod config;
pub mod heartbeat;
pub mod orchestrator;
pub mod producer;
pub mod report;
pub mod retry;
pub mod submitter;
pub mod watcher;

pub use config::ProducerConfig;
pub use heartbeat::{HeartbeatHandler, HeartbeatWatcher};
pub use orchestrator::Orchestrator;
pub use producer::ProducerLoop;
pub use report::{ConsoleReporter, MemorySink, OutputSink, StdoutSink};
pub use retry::{RetryPolicy, MAX_RETRIES};
pub use submitter::{SubmitOutcome, Submitter};
pub use watcher::{StatusHandler, TaskWatcher, TaskWatchers, WatchOutcome, WatcherRegistry};
