// Irrigation Agent - EC-driven irrigation timing with LLM-backed reflection and planning

pub mod agents;
pub mod config;
pub mod control;
pub mod devices;
pub mod llm;
pub mod models;
pub mod storage;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::Config;
pub use control::{ControlLoop, Devices, RunReport, StopReason};
