//! Compute-node lifecycle listener.
//!
//! Measures how long a node takes from "launching" to "online" and reports
//! it as the daemon gauge `bootstrap`, tagged with the reporting host.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::lease::ClientLeases;
use crate::clock::Clock;
use crate::config::Config;
use crate::correlation::CorrelationTracker;
use crate::tags::TagBuilder;
use crate::telemetry::start_node_span;

pub struct ComputerListener {
    leases: Arc<ClientLeases>,
    tags: TagBuilder,
    launches: CorrelationTracker,
    clock: Arc<dyn Clock>,
}

impl ComputerListener {
    pub fn new(config: &Config, leases: Arc<ClientLeases>, clock: Arc<dyn Clock>) -> Self {
        Self {
            leases,
            tags: TagBuilder::from_config(config),
            launches: CorrelationTracker::new(config.pending_node_ttl(), config.max_pending_nodes),
            clock,
        }
    }

    pub fn with_tag_builder(mut self, tags: TagBuilder) -> Self {
        self.tags = tags;
        self
    }

    pub fn on_launching(&self, node: &str) {
        let span = start_node_span(node, "launching");
        let _enter = span.enter();

        let now = self.clock.now_millis();
        self.launches.evict_stale(now);
        self.launches.record_start(node, now, now);
    }

    pub fn on_online(&self, node: &str) {
        let span = start_node_span(node, "online");
        let _enter = span.enter();

        let Some(elapsed_ms) = self.launches.resolve_duration(node, self.clock.now_millis()) else {
            debug!("node came online without a recorded launch");
            return;
        };
        debug!(elapsed_ms, "node bootstrapped");

        let Some(daemon) = self.leases.daemon() else {
            return;
        };
        let tags = self.tags.host_tags();
        if let Err(e) = daemon.gauge("bootstrap", elapsed_ms / 1000, tags.as_slice()) {
            warn!(error = %e, "daemon gauge failed");
        }
    }

    /// A node that goes away before coming online will never resolve.
    pub fn on_offline(&self, node: &str) {
        let span = start_node_span(node, "offline");
        let _enter = span.enter();

        if self.launches.forget(node) {
            debug!("dropped pending launch");
        }
    }

    pub fn pending_launches(&self) -> usize {
        self.launches.len()
    }
}
