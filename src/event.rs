//! Lifecycle events received from the orchestrator.
//!
//! A finished run is described through [`RunContext`] so orchestrator
//! adapters can resolve fields lazily (and fail to). [`RunEvent`] is the
//! plain-data implementation used by the relay and by tests. Compute-node
//! transitions only carry the node name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Outcome of a run. Absent while the run is still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
}

impl RunResult {
    pub fn is_success(self) -> bool {
        self == RunResult::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunResult::Success => "SUCCESS",
            RunResult::Failure => "FAILURE",
            RunResult::Unstable => "UNSTABLE",
            RunResult::Aborted => "ABORTED",
            RunResult::NotBuilt => "NOT_BUILT",
        }
    }
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment variables captured for a run.
///
/// Empty values are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvVars(HashMap<String, String>);

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// What a listener can learn about a run.
pub trait RunContext {
    fn job_name(&self) -> &str;

    /// Full name of the folder/parent chain. Empty at the top level.
    fn parent_full_name(&self) -> &str;

    fn result(&self) -> Option<RunResult>;

    /// Build sequence number.
    fn number(&self) -> u64;

    /// Duration reported by the orchestrator. `Some(0)` is a real report,
    /// some runner types always say 0. `None` means nothing was reported.
    fn duration_ms(&self) -> Option<u64>;

    fn started_at(&self) -> Option<DateTime<Utc>>;

    fn environment(&self) -> Result<EnvVars>;

    /// `parent/job`, or just `job` at the top level.
    fn full_name(&self) -> String {
        let parent = self.parent_full_name().trim_matches('/');
        let job = self.job_name().trim_matches('/');
        if parent.is_empty() {
            job.to_string()
        } else {
            format!("{parent}/{job}")
        }
    }
}

/// A run as plain data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunEvent {
    pub job_name: String,
    #[serde(default)]
    pub parent_full_name: String,
    #[serde(default)]
    pub result: Option<RunResult>,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub env: EnvVars,
}

impl RunEvent {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent_full_name: impl Into<String>) -> Self {
        self.parent_full_name = parent_full_name.into();
        self
    }

    pub fn with_result(mut self, result: RunResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_number(mut self, number: u64) -> Self {
        self.number = number;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key, value);
        self
    }
}

impl RunContext for RunEvent {
    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn parent_full_name(&self) -> &str {
        &self.parent_full_name
    }

    fn result(&self) -> Option<RunResult> {
        self.result
    }

    fn number(&self) -> u64 {
        self.number
    }

    fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn environment(&self) -> Result<EnvVars> {
        Ok(self.env.clone())
    }
}

/// One line of the relay's input stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted(RunEvent),
    RunCompleted(RunEvent),
    NodeLaunching { node: String },
    NodeOnline { node: String },
    NodeOffline { node: String },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RunStarted(_) => "run_started",
            Event::RunCompleted(_) => "run_completed",
            Event::NodeLaunching { .. } => "node_launching",
            Event::NodeOnline { .. } => "node_online",
            Event::NodeOffline { .. } => "node_offline",
        }
    }
}
