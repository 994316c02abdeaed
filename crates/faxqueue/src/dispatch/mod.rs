//! The exclusive dispatch loop and its retry and cleanup plumbing.

pub mod cleanup;
pub mod config;
pub mod engine;
pub mod retry;

pub use config::DispatchConfig;
pub use engine::{DispatchEngine, EngineHandle, JobOutcome, SkipReason, Tick};
pub use retry::send_with_retry;
