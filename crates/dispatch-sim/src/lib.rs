//! Dispatch Sim
//!
//! In-process queue implementations: [`LocalQueue`] simulates a worker fleet
//! so the producer can run without external infrastructure, and
//! [`ScriptedQueue`] replays canned responses for tests.

mod config;
mod local;
mod scripted;

pub use config::SimConfig;
pub use local::LocalQueue;
pub use scripted::{ScriptedQueue, SendRecord};
