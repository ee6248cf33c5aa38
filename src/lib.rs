//! # runmetrics
//!
//! Turns build-runner lifecycle events into metrics.
//!
//! Run completions become a duration gauge and a status service check on
//! the HTTP metrics API plus a few daemon metrics; compute-node launches
//! become a bootstrap-time gauge. Everything is best effort: a metrics
//! problem is logged and never reaches the orchestrator.

pub mod client;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod counters;
pub mod error;
pub mod event;
pub mod listener;
pub mod pipeline;
pub mod tags;
pub mod telemetry;
