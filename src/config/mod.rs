//! Typed configuration, passed explicitly to every component.
//!
//! Non-secret settings come from an optional TOML file and can be
//! overridden by environment variables. The API key is only ever read
//! from the environment and is wrapped in `secrecy::SecretString` so it
//! cannot leak through `Debug` output or logs.

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.datadoghq.com/api/";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Credential for the HTTP metrics API. Env only.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    /// Base URL of the HTTP metrics API, with trailing slash.
    pub api_url: String,
    /// `host:port` of the metrics daemon.
    pub daemon_host: Option<String>,
    /// Hostname used when an event carries no usable `HOSTNAME`.
    pub hostname: Option<String>,
    /// Prefix for every metric name (`<prefix>.job.duration`).
    pub prefix: String,
    /// Whether completion metrics carry a `node:` tag.
    pub tag_node: bool,
    /// Allow-list of job full names. Empty tracks every job.
    pub tracked_jobs: Vec<String>,
    /// Deny-list of job full names. Wins over the allow-list.
    pub excluded_jobs: Vec<String>,
    /// How long a node may sit between "preparing" and "online" before
    /// its start entry is evicted.
    pub pending_node_ttl_secs: u64,
    pub max_pending_nodes: usize,
    pub flush_interval_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            daemon_host: None,
            hostname: None,
            prefix: "ci".to_string(),
            tag_node: true,
            tracked_jobs: Vec::new(),
            excluded_jobs: Vec::new(),
            pending_node_ttl_secs: 3600,
            max_pending_nodes: 1024,
            flush_interval_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables only.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Parse a TOML config file. Environment overrides are not applied.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the optional file, then overlay the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(key) = optional_var("METRICS_API_KEY") {
            self.api_key = Some(SecretString::from(key));
        }
        if let Some(url) = optional_var("METRICS_API_URL") {
            self.api_url = url;
        }
        if let Some(host) = optional_var("METRICS_DAEMON_HOST") {
            self.daemon_host = Some(host);
        }
        if let Some(hostname) = optional_var("METRICS_HOSTNAME") {
            self.hostname = Some(hostname);
        }
        if let Some(prefix) = optional_var("METRICS_PREFIX") {
            self.prefix = prefix;
        }
        if let Some(flag) = optional_var("METRICS_TAG_NODE") {
            self.tag_node = parse_flag("METRICS_TAG_NODE", &flag)?;
        }
        if let Some(level) = optional_var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// True when at least one metrics backend could be reached.
    pub fn has_backend(&self) -> bool {
        self.has_api_key() || self.daemon_host.is_some()
    }

    /// Whether completions of `full_name` should produce metrics.
    pub fn is_job_tracked(&self, full_name: &str) -> bool {
        let matches = |list: &[String]| list.iter().any(|j| j.eq_ignore_ascii_case(full_name));
        if matches(&self.excluded_jobs) {
            return false;
        }
        self.tracked_jobs.is_empty() || matches(&self.tracked_jobs)
    }

    pub fn pending_node_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_node_ttl_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }

    /// Full metric name under the configured prefix.
    pub fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}.{suffix}", self.prefix)
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
