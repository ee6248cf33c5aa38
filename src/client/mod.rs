//! Clients for the two metrics backends.
//!
//! [`ApiClient`] submits metrics and service checks to the HTTP metrics
//! API. [`DaemonClient`] sends small fire-and-forget packets to a local
//! metrics daemon. Both are leased through [`lease::ClientLeases`].

pub mod http;
pub mod lease;
pub mod statsd;

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Status code of a service check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl CheckStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// The HTTP metrics API. `host` is `None` when no hostname could be
/// resolved; the submission then carries no host.
pub trait ApiClient: Send + Sync {
    /// Submit a gauge.
    fn metric(&self, name: &str, value: f64, host: Option<&str>, tags: &[String]) -> Result<()>;

    /// Submit a count accumulated since the last submission.
    fn count(&self, name: &str, value: u64, host: Option<&str>, tags: &[String]) -> Result<()>;

    fn service_check(
        &self,
        name: &str,
        status: CheckStatus,
        host: Option<&str>,
        tags: &[String],
    ) -> Result<()>;
}

/// The metrics daemon.
pub trait DaemonClient: Send + Sync {
    fn gauge(&self, name: &str, value: u64, tags: &[String]) -> Result<()>;

    fn increment(&self, name: &str, tags: &[String]) -> Result<()>;
}

/// A parsed `host:port` daemon address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonAddr {
    pub host: String,
    pub port: u16,
}

impl FromStr for DaemonAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::DaemonAddress {
            addr: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| invalid("port is not a number between 0 and 65535"))?;
        if port == 0 {
            return Err(invalid("port must not be 0"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for DaemonAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
