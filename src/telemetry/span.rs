//! Spans wrapping each listener callback, so every log line emitted while
//! handling an event names the run or node it belongs to.

use tracing::Span;

/// Span for handling one run event.
pub fn start_run_span(job: &str, number: u64) -> Span {
    tracing::info_span!("run", "run.job" = job, "run.number" = number)
}

/// Span for one compute-node transition (`launching`, `online`, `offline`).
pub fn start_node_span(node: &str, transition: &'static str) -> Span {
    tracing::info_span!("node", "node.name" = node, "node.transition" = transition)
}
