//! The heartbeat orchestrator and its cycle logic.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
