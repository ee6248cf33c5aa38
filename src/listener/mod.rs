//! Orchestrator event listeners.

pub mod build;
pub mod computer;

pub use build::BuildListener;
pub use computer::ComputerListener;
