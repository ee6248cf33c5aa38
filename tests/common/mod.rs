//! Recording backend clients and fixtures shared by the integration tests.

#![allow(dead_code)]

use runmetrics::client::lease::{ClientLeases, Lease};
use runmetrics::client::{ApiClient, CheckStatus, DaemonClient};
use runmetrics::clock::Clock;
use runmetrics::config::Config;
use runmetrics::error::{Error, Result};
use runmetrics::pipeline::Pipeline;
use runmetrics::tags::TagBuilder;
use secrecy::SecretString;
use std::sync::{Arc, Mutex};

pub const FALLBACK_HOST: &str = "fallback-host";

/// Expected host of a submission made with no resolvable hostname.
pub const NO_HOST: Option<&str> = None;

// ---------------------------------------------------------------------------
// HTTP API stub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Metric {
        name: String,
        value: f64,
        host: Option<String>,
        tags: Vec<String>,
    },
    Count {
        name: String,
        value: u64,
        host: Option<String>,
        tags: Vec<String>,
    },
    ServiceCheck {
        name: String,
        status: CheckStatus,
        host: Option<String>,
        tags: Vec<String>,
    },
}

#[derive(Default)]
pub struct RecordingApiClient {
    submissions: Mutex<Vec<Submission>>,
    failing: bool,
}

impl RecordingApiClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records nothing and fails every call.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            submissions: Mutex::new(Vec::new()),
            failing: true,
        })
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Remove a matching gauge, panicking if there is none.
    pub fn assert_metric<'a>(
        &self,
        name: &str,
        value: f64,
        host: impl Into<Option<&'a str>>,
        tags: &[&str],
    ) {
        let expected = Submission::Metric {
            name: name.to_string(),
            value,
            host: host.into().map(str::to_string),
            tags: strings(tags),
        };
        self.take(&expected);
    }

    /// Remove a matching count, panicking if there is none.
    pub fn assert_count<'a>(
        &self,
        name: &str,
        value: u64,
        host: impl Into<Option<&'a str>>,
        tags: &[&str],
    ) {
        let expected = Submission::Count {
            name: name.to_string(),
            value,
            host: host.into().map(str::to_string),
            tags: strings(tags),
        };
        self.take(&expected);
    }

    /// Remove a matching service check, panicking if there is none.
    pub fn assert_service_check<'a>(
        &self,
        name: &str,
        status: CheckStatus,
        host: impl Into<Option<&'a str>>,
        tags: &[&str],
    ) {
        let expected = Submission::ServiceCheck {
            name: name.to_string(),
            status,
            host: host.into().map(str::to_string),
            tags: strings(tags),
        };
        self.take(&expected);
    }

    /// Every submission has been matched by an assertion.
    pub fn assert_all_asserted(&self) {
        let left = self.submissions.lock().unwrap();
        assert!(left.is_empty(), "unasserted submissions: {left:?}");
    }

    fn take(&self, expected: &Submission) {
        let mut submissions = self.submissions.lock().unwrap();
        match submissions.iter().position(|s| s == expected) {
            Some(i) => {
                submissions.remove(i);
            }
            None => panic!("expected {expected:?}, got {submissions:?}"),
        }
    }

    fn record(&self, submission: Submission) -> Result<()> {
        if self.failing {
            return Err(Error::Transport("stub api is down".to_string()));
        }
        self.submissions.lock().unwrap().push(submission);
        Ok(())
    }
}

impl ApiClient for RecordingApiClient {
    fn metric(&self, name: &str, value: f64, host: Option<&str>, tags: &[String]) -> Result<()> {
        self.record(Submission::Metric {
            name: name.to_string(),
            value,
            host: host.map(str::to_string),
            tags: tags.to_vec(),
        })
    }

    fn count(&self, name: &str, value: u64, host: Option<&str>, tags: &[String]) -> Result<()> {
        self.record(Submission::Count {
            name: name.to_string(),
            value,
            host: host.map(str::to_string),
            tags: tags.to_vec(),
        })
    }

    fn service_check(
        &self,
        name: &str,
        status: CheckStatus,
        host: Option<&str>,
        tags: &[String],
    ) -> Result<()> {
        self.record(Submission::ServiceCheck {
            name: name.to_string(),
            status,
            host: host.map(str::to_string),
            tags: tags.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Daemon stub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DaemonCall {
    Gauge {
        name: String,
        value: u64,
        tags: Vec<String>,
    },
    Increment {
        name: String,
        tags: Vec<String>,
    },
}

#[derive(Default)]
pub struct RecordingDaemonClient {
    calls: Mutex<Vec<DaemonCall>>,
    failing: bool,
}

impl RecordingDaemonClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failing: true,
        })
    }

    pub fn calls(&self) -> Vec<DaemonCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn assert_gauge(&self, name: &str, value: u64, tags: &[&str]) {
        self.take(&DaemonCall::Gauge {
            name: name.to_string(),
            value,
            tags: strings(tags),
        });
    }

    pub fn assert_increment(&self, name: &str, tags: &[&str]) {
        self.take(&DaemonCall::Increment {
            name: name.to_string(),
            tags: strings(tags),
        });
    }

    pub fn assert_all_asserted(&self) {
        let left = self.calls.lock().unwrap();
        assert!(left.is_empty(), "unasserted daemon calls: {left:?}");
    }

    fn take(&self, expected: &DaemonCall) {
        let mut calls = self.calls.lock().unwrap();
        match calls.iter().position(|c| c == expected) {
            Some(i) => {
                calls.remove(i);
            }
            None => panic!("expected {expected:?}, got {calls:?}"),
        }
    }

    fn record(&self, call: DaemonCall) -> Result<()> {
        if self.failing {
            return Err(Error::Transport("stub daemon is down".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl DaemonClient for RecordingDaemonClient {
    fn gauge(&self, name: &str, value: u64, tags: &[String]) -> Result<()> {
        self.record(DaemonCall::Gauge {
            name: name.to_string(),
            value,
            tags: tags.to_vec(),
        })
    }

    fn increment(&self, name: &str, tags: &[String]) -> Result<()> {
        self.record(DaemonCall::Increment {
            name: name.to_string(),
            tags: tags.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// API key set, `ci` prefix, node tagging on, every job tracked.
pub fn test_config() -> Config {
    Config {
        api_key: Some(SecretString::from("test-api-key")),
        prefix: "ci".to_string(),
        tag_node: true,
        ..Config::default()
    }
}

pub fn leases(
    api: Option<Arc<RecordingApiClient>>,
    daemon: Option<Arc<RecordingDaemonClient>>,
) -> ClientLeases {
    let api = match api {
        Some(client) => Lease::ready("api", client as Arc<dyn ApiClient>),
        None => Lease::unavailable("api"),
    };
    let daemon = match daemon {
        Some(client) => Lease::ready("daemon", client as Arc<dyn DaemonClient>),
        None => Lease::unavailable("daemon"),
    };
    ClientLeases::new(api, daemon)
}

/// A pipeline over stub clients with a pinned fallback hostname.
pub fn pipeline(
    config: Config,
    api: Option<Arc<RecordingApiClient>>,
    daemon: Option<Arc<RecordingDaemonClient>>,
    clock: Arc<dyn Clock>,
) -> Pipeline {
    let tags = TagBuilder::new(Some(FALLBACK_HOST.to_string()), config.tag_node);
    Pipeline::with_parts(config, leases(api, daemon), clock).with_tag_builder(tags)
}

/// A pipeline over stub clients on a machine with no usable hostname.
pub fn hostless_pipeline(
    config: Config,
    api: Option<Arc<RecordingApiClient>>,
    daemon: Option<Arc<RecordingDaemonClient>>,
    clock: Arc<dyn Clock>,
) -> Pipeline {
    let tags = TagBuilder::new(None, config.tag_node);
    Pipeline::with_parts(config, leases(api, daemon), clock).with_tag_builder(tags)
}
