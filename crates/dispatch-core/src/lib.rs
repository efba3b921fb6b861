//! Dispatch Core
//!
//! Data model, task synthesis and the queue capability shared by the
//! emergency-dispatch producer crates.

mod error;
mod fault;
mod queue;
mod status;
mod synth;
mod task;

pub use error::{QueueError, Result, SimulatedFault, SubmitError};
pub use fault::{FaultInjector, DEFAULT_FAULT_PROBABILITY};
pub use queue::{HeartbeatStream, Queue, TaskStatusStream};
pub use status::{HeartbeatUpdate, TaskState, TaskStatusUpdate};
pub use synth::{Synthesizer, TaskSource, HOME_REGION_PROBABILITY};
pub use task::{
    EmergencyTask, EmergencyType, Level, Location, Region, Severity, TaskAttribute, TaskHandle,
    HOME_REGION, OUT_OF_REGION,
};
