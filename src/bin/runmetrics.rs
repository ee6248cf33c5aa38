//! runmetrics CLI: relay orchestrator events into metrics.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use runmetrics::client::DaemonAddr;
use runmetrics::client::lease::ClientLeases;
use runmetrics::config::Config;
use runmetrics::event::Event;
use runmetrics::pipeline::Pipeline;
use runmetrics::tags::TagBuilder;
use runmetrics::telemetry::{TelemetryConfig, init_telemetry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How long queued api submissions get to finish before exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "runmetrics", about = "Turn build-runner events into metrics")]
struct Cli {
    /// TOML config file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read newline-delimited JSON events and emit metrics for them
    Relay {
        /// Event file (defaults to stdin)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Maximum events handled concurrently
        #[arg(long, default_value_t = 8)]
        workers: usize,
    },
    /// Print the resolved configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Relay { input, workers } => {
            init_telemetry(TelemetryConfig {
                log_level: config.log_level.clone(),
                ansi: true,
            })?;
            cmd_relay(config, input, workers).await
        }
        Command::CheckConfig => cmd_check_config(&config),
    }
}

async fn cmd_relay(config: Config, input: Option<PathBuf>, workers: usize) -> anyhow::Result<()> {
    let flush_every = config.flush_interval();
    let pipeline = Arc::new(Pipeline::new(config));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("cannot open event file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();

    let limit = Arc::new(Semaphore::new(workers.max(1)));
    let mut handlers = JoinSet::new();
    let mut flush = tokio::time::interval(flush_every);
    flush.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(workers, "relay started");
    let mut line_no: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, shutting down");
                break;
            }
            _ = flush.tick() => {
                let p = Arc::clone(&pipeline);
                tokio::task::spawn_blocking(move || p.flush_counters()).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let event: Event = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(line = line_no, error = %e, "skipping malformed event");
                        continue;
                    }
                };

                let permit = Arc::clone(&limit).acquire_owned().await?;
                let p = Arc::clone(&pipeline);
                handlers.spawn_blocking(move || {
                    p.dispatch(&event);
                    drop(permit);
                });
            }
        }

        while let Some(done) = handlers.try_join_next() {
            if let Err(e) = done {
                error!(error = %e, "event handler panicked");
            }
        }
    }

    while let Some(done) = handlers.join_next().await {
        if let Err(e) = done {
            error!(error = %e, "event handler panicked");
        }
    }

    let p = Arc::clone(&pipeline);
    let flushed = tokio::task::spawn_blocking(move || p.flush_counters()).await?;
    info!(events = line_no, flushed, "relay finished");

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    Ok(())
}

fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    let tags = TagBuilder::from_config(config);
    let list = |jobs: &[String]| {
        if jobs.is_empty() {
            "-".to_string()
        } else {
            jobs.join(", ")
        }
    };

    println!("API URL:        {}", config.api_url);
    println!(
        "API Key:        {}",
        if config.has_api_key() { "set" } else { "not set" }
    );
    match &config.daemon_host {
        Some(addr) => match addr.parse::<DaemonAddr>() {
            Ok(parsed) => println!("Daemon:         {parsed}"),
            Err(e) => println!("Daemon:         {addr} (unusable: {e})"),
        },
        None => println!("Daemon:         -"),
    }
    println!("Hostname:       {}", tags.fallback_hostname().unwrap_or("-"));
    println!("Prefix:         {}", config.prefix);
    println!("Tag Node:       {}", config.tag_node);
    println!("Tracked Jobs:   {}", list(&config.tracked_jobs));
    println!("Excluded Jobs:  {}", list(&config.excluded_jobs));
    println!("Node TTL:       {}s", config.pending_node_ttl_secs);
    println!("Flush Every:    {}s", config.flush_interval().as_secs());

    let leases = ClientLeases::from_config(config);
    let status = |ready: bool| if ready { "ready" } else { "unavailable" };
    println!("---");
    println!("API Client:     {}", status(leases.api().is_some()));
    println!("Daemon Client:  {}", status(leases.daemon().is_some()));

    if !config.has_backend() {
        println!("---");
        println!("No backend configured: set METRICS_API_KEY or daemon_host.");
    }
    Ok(())
}
