//! Run lifecycle listener.
//!
//! On completion a tracked run produces:
//! - gauge `<prefix>.job.duration` (whole seconds) and service check
//!   `<prefix>.job.status` through the HTTP API,
//! - `completed` (+1) and gauge `leadtime` through the metrics daemon,
//! - one increment of the `<prefix>.job.completed` counter, flushed later
//!   through the HTTP API.
//!
//! The two backends are independent: either may be missing or failing
//! without affecting the other.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::CheckStatus;
use crate::client::lease::ClientLeases;
use crate::clock::Clock;
use crate::config::Config;
use crate::correlation::CorrelationTracker;
use crate::counters::{CounterKey, MetricCounterStore};
use crate::error::{Error, Result};
use crate::event::{RunContext, RunResult};
use crate::tags::{TagBuilder, TagSet};
use crate::telemetry::start_run_span;

pub struct BuildListener {
    config: Arc<Config>,
    leases: Arc<ClientLeases>,
    counters: Arc<MetricCounterStore>,
    tags: TagBuilder,
    starts: CorrelationTracker,
    clock: Arc<dyn Clock>,
}

impl BuildListener {
    pub fn new(
        config: Arc<Config>,
        leases: Arc<ClientLeases>,
        counters: Arc<MetricCounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tags = TagBuilder::from_config(&config);
        let starts = CorrelationTracker::new(config.pending_node_ttl(), config.max_pending_nodes);
        Self {
            config,
            leases,
            counters,
            tags,
            starts,
            clock,
        }
    }

    /// Replace the tag builder, e.g. to pin the fallback hostname.
    pub fn with_tag_builder(mut self, tags: TagBuilder) -> Self {
        self.tags = tags;
        self
    }

    /// Remember when a run started, for runs that finish without a
    /// reported duration.
    pub fn on_started<R: RunContext + ?Sized>(&self, run: &R) {
        let span = start_run_span(run.job_name(), run.number());
        let _enter = span.enter();

        if !self.config.is_job_tracked(&run.full_name()) {
            return;
        }
        let now = self.clock.now_millis();
        let started_at = run.started_at().map(|t| t.timestamp_millis()).unwrap_or(now);
        self.starts.record_start(run_key(run), started_at, now);
    }

    /// Emit completion metrics. Never fails: problems are logged and the
    /// run is skipped.
    pub fn on_completed<R: RunContext + ?Sized>(&self, run: &R) {
        let span = start_run_span(run.job_name(), run.number());
        let _enter = span.enter();

        if let Err(e) = self.handle_completed(run) {
            warn!(error = %e, "skipping completion metrics");
        }
    }

    /// Runs started but not yet completed.
    pub fn pending_runs(&self) -> usize {
        self.starts.len()
    }

    fn handle_completed<R: RunContext + ?Sized>(&self, run: &R) -> Result<()> {
        let env = run.environment()?;
        if run.job_name().trim().is_empty() {
            return Err(Error::Context("run has no job name".to_string()));
        }

        let full_name = run.full_name();
        if !self.config.is_job_tracked(&full_name) {
            debug!(job = %full_name, "job is not tracked");
            self.starts.forget(&run_key(run));
            return Ok(());
        }
        if !self.config.has_backend() {
            debug!("no metrics backend configured");
            return Ok(());
        }

        let duration_secs = self.duration_ms(run) / 1000;
        let tags = self.tags.build(run, &env);
        let host = self.tags.resolve_hostname(&env);

        if self.config.has_api_key() {
            self.counters.increment(CounterKey::new(
                self.config.metric_name("job.completed"),
                tags.iter().cloned(),
            ));
        }
        self.emit_to_api(run.result(), duration_secs, host, &tags);
        self.emit_to_daemon(duration_secs, &tags);
        Ok(())
    }

    /// The reported duration when there is one (0 included), else the
    /// wall-clock time since the run was seen starting.
    fn duration_ms<R: RunContext + ?Sized>(&self, run: &R) -> u64 {
        let key = run_key(run);
        if let Some(reported) = run.duration_ms() {
            self.starts.forget(&key);
            return reported;
        }

        let now = self.clock.now_millis();
        if let Some(elapsed) = self.starts.resolve_duration(&key, now) {
            return elapsed;
        }
        match run.started_at() {
            Some(started) => (now - started.timestamp_millis()).max(0) as u64,
            None => {
                debug!("no duration reported and no start seen");
                0
            }
        }
    }

    fn emit_to_api(
        &self,
        result: Option<RunResult>,
        duration_secs: u64,
        host: Option<&str>,
        tags: &TagSet,
    ) {
        let Some(client) = self.leases.api() else {
            return;
        };

        let name = self.config.metric_name("job.duration");
        if let Err(e) = client.metric(&name, duration_secs as f64, host, tags.as_slice()) {
            warn!(metric = %name, error = %e, "metric submission failed");
        }

        let Some(result) = result else {
            return;
        };
        let status = if result.is_success() {
            CheckStatus::Ok
        } else {
            CheckStatus::Critical
        };
        let name = self.config.metric_name("job.status");
        if let Err(e) = client.service_check(&name, status, host, tags.as_slice()) {
            warn!(check = %name, error = %e, "service check submission failed");
        }
    }

    fn emit_to_daemon(&self, duration_secs: u64, tags: &TagSet) {
        let Some(daemon) = self.leases.daemon() else {
            return;
        };

        if let Err(e) = daemon.increment("completed", tags.as_slice()) {
            warn!(error = %e, "daemon increment failed");
        }
        if let Err(e) = daemon.gauge("leadtime", duration_secs, tags.as_slice()) {
            warn!(error = %e, "daemon gauge failed");
        }
    }
}

fn run_key<R: RunContext + ?Sized>(run: &R) -> String {
    format!("{}#{}", run.full_name(), run.number())
}
