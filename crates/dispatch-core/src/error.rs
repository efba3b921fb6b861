use crate::TaskHandle;
use thiserror::Error;

/// Errors raised by a queue implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Queue rejected task: {0}")]
    Rejected(String),

    #[error("Unknown task: {0}")]
    UnknownTask(TaskHandle),

    #[error("Stream closed: {0}")]
    StreamClosed(String),
}

/// Injected failure used to exercise the retry path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Simulated connection error")]
pub struct SimulatedFault;

/// A single failed submission attempt.
///
/// Both variants are retried identically.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error(transparent)]
    SimulatedFault(#[from] SimulatedFault),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
