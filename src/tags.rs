//! Tag derivation for run metrics.
//!
//! Tags are `key:value` strings in a fixed order (`job`, `node`, `result`,
//! `branch`, `host`) so the same run always yields the same sequence.
//! Missing inputs drop their tag entirely rather than producing an empty
//! value; with no usable hostname there is no `host` tag either.

use crate::config::Config;
use crate::event::{EnvVars, RunContext};

const HOSTNAME_MAX_LEN: usize = 255;
const LABEL_MAX_LEN: usize = 63;
const LOCAL_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "localhost6.localdomain6",
    "ip6-localhost",
];

/// An ordered, immutable set of `key:value` tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the first tag with the given key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find_map(|tag| {
            tag.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix(':'))
        })
    }

    fn push(&mut self, key: &str, value: &str) {
        self.0.push(format!("{key}:{value}"));
    }
}

/// Derives the tag set for a run.
#[derive(Debug, Clone)]
pub struct TagBuilder {
    fallback_hostname: Option<String>,
    tag_node: bool,
}

impl TagBuilder {
    pub fn new(fallback_hostname: Option<String>, tag_node: bool) -> Self {
        Self {
            fallback_hostname,
            tag_node,
        }
    }

    /// Fallback is the configured hostname, else the machine's own name.
    pub fn from_config(config: &Config) -> Self {
        let fallback = config
            .hostname
            .clone()
            .filter(|h| is_valid_hostname(h))
            .or_else(system_hostname);
        Self::new(fallback, config.tag_node)
    }

    pub fn fallback_hostname(&self) -> Option<&str> {
        self.fallback_hostname.as_deref()
    }

    /// `HOSTNAME` from the run's environment when it is usable, else the
    /// fallback. `None` when neither exists.
    pub fn resolve_hostname<'a>(&'a self, env: &'a EnvVars) -> Option<&'a str> {
        match env.get("HOSTNAME") {
            Some(host) if is_valid_hostname(host) => Some(host),
            _ => self.fallback_hostname(),
        }
    }

    pub fn build<R: RunContext + ?Sized>(&self, run: &R, env: &EnvVars) -> TagSet {
        let mut tags = TagSet::default();

        tags.push("job", &run.full_name());

        if self.tag_node {
            if let Some(node) = env.get("NODE_NAME") {
                tags.push("node", node);
            }
        }
        if let Some(result) = run.result() {
            tags.push("result", result.as_str());
        }
        if let Some(branch) = env.get("GIT_BRANCH") {
            tags.push("branch", branch);
        }
        if let Some(host) = self.resolve_hostname(env) {
            tags.push("host", host);
        }

        tags
    }

    /// Tags for metrics that only identify the emitting host. Empty when
    /// there is no fallback hostname.
    pub fn host_tags(&self) -> TagSet {
        let mut tags = TagSet::default();
        if let Some(host) = self.fallback_hostname() {
            tags.push("host", host);
        }
        tags
    }
}

/// RFC 1123 hostname check. Loopback names are rejected since they do not
/// identify a machine to the metrics backend.
pub fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > HOSTNAME_MAX_LEN {
        return false;
    }
    if LOCAL_HOSTNAMES.iter().any(|l| l.eq_ignore_ascii_case(host)) {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= LABEL_MAX_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

pub fn system_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| is_valid_hostname(h))
}
