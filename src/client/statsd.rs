//! DogStatsD daemon client on top of `cadence`.
//!
//! Metrics go out through a non-blocking UDP sink, so a full send buffer
//! drops the packet instead of stalling the listener that emitted it.

use cadence::prelude::*;
use cadence::{MetricError, StatsdClient, UdpMetricSink};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use super::{DaemonAddr, DaemonClient};
use crate::error::{Error, Result};

pub struct UdpDaemonClient {
    client: StatsdClient,
}

impl UdpDaemonClient {
    /// Resolve `addr` and open a non-blocking sink to it. Every metric name
    /// is prefixed with `namespace`.
    pub fn connect(addr: &DaemonAddr, namespace: &str) -> Result<Self> {
        let target = (addr.host.as_str(), addr.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::DaemonAddress {
                addr: addr.to_string(),
                reason: "host did not resolve".to_string(),
            })?;
        let bind: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        let sink = UdpMetricSink::from(target, socket)
            .map_err(|e| Error::Transport(format!("daemon sink for {addr}: {e}")))?;

        Ok(Self {
            client: StatsdClient::from_sink(namespace.trim_end_matches('.'), sink),
        })
    }
}

impl DaemonClient for UdpDaemonClient {
    fn gauge(&self, name: &str, value: u64, tags: &[String]) -> Result<()> {
        let tags = sanitize_tags(tags);
        let mut builder = self.client.gauge_with_tags(name, value);
        for tag in &tags {
            builder = builder.with_tag_value(tag);
        }
        builder.try_send().map(|_| ()).map_err(send_error)
    }

    fn increment(&self, name: &str, tags: &[String]) -> Result<()> {
        let tags = sanitize_tags(tags);
        let mut builder = self.client.incr_with_tags(name);
        for tag in &tags {
            builder = builder.with_tag_value(tag);
        }
        builder.try_send().map(|_| ()).map_err(send_error)
    }
}

fn send_error(e: MetricError) -> Error {
    Error::Transport(format!("daemon send: {e}"))
}

/// `|` and `,` delimit fields and tags on the wire; a tag value (a branch
/// name, say) may contain either.
pub fn sanitize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.replace(['|', ',', '\n'], "_"))
        .collect()
}
