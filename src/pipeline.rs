//! Composition root. Owns the configuration, client leases, counter store
//! and both listeners, and routes incoming events to them.
//!
//! `Pipeline` is `Send + Sync`; share it behind an `Arc` and dispatch from
//! as many threads as the orchestrator uses.

use std::sync::Arc;
use tracing::debug;

use crate::client::lease::ClientLeases;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::counters::{self, MetricCounterStore};
use crate::event::Event;
use crate::listener::{BuildListener, ComputerListener};
use crate::tags::TagBuilder;

pub struct Pipeline {
    config: Arc<Config>,
    leases: Arc<ClientLeases>,
    counters: Arc<MetricCounterStore>,
    tags: TagBuilder,
    builds: BuildListener,
    computers: ComputerListener,
}

impl Pipeline {
    /// Pipeline with real backend clients and the system clock.
    pub fn new(config: Config) -> Self {
        let leases = ClientLeases::from_config(&config);
        Self::with_parts(config, leases, Arc::new(SystemClock))
    }

    pub fn with_parts(config: Config, leases: ClientLeases, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);
        let leases = Arc::new(leases);
        let counters = Arc::new(MetricCounterStore::new());
        let tags = TagBuilder::from_config(&config);

        let builds = BuildListener::new(
            Arc::clone(&config),
            Arc::clone(&leases),
            Arc::clone(&counters),
            Arc::clone(&clock),
        );
        let computers = ComputerListener::new(&config, Arc::clone(&leases), clock);

        Self {
            config,
            leases,
            counters,
            tags,
            builds,
            computers,
        }
    }

    /// Use `tags` for every listener instead of the config-derived builder.
    pub fn with_tag_builder(mut self, tags: TagBuilder) -> Self {
        self.builds = self.builds.with_tag_builder(tags.clone());
        self.computers = self.computers.with_tag_builder(tags.clone());
        self.tags = tags;
        self
    }

    pub fn dispatch(&self, event: &Event) {
        match event {
            Event::RunStarted(run) => self.builds.on_started(run),
            Event::RunCompleted(run) => self.builds.on_completed(run),
            Event::NodeLaunching { node } => self.computers.on_launching(node),
            Event::NodeOnline { node } => self.computers.on_online(node),
            Event::NodeOffline { node } => self.computers.on_offline(node),
        }
    }

    /// Submit and reset all counters. Returns how many were submitted.
    pub fn flush_counters(&self) -> usize {
        if self.counters.is_empty() {
            return 0;
        }
        let Some(client) = self.leases.api() else {
            debug!(pending = self.counters.len(), "no api client, counters kept");
            return 0;
        };
        counters::flush(&self.counters, client.as_ref(), self.tags.fallback_hostname())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn leases(&self) -> &ClientLeases {
        &self.leases
    }

    pub fn counters(&self) -> &MetricCounterStore {
        &self.counters
    }

    pub fn builds(&self) -> &BuildListener {
        &self.builds
    }

    pub fn computers(&self) -> &ComputerListener {
        &self.computers
    }
}
