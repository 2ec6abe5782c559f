//! fleetmon - periodic resource telemetry collection across a fleet.
//!
//! Polls each host's monitoring agent, normalizes CPU, memory, disk and
//! network samples, and appends one batch per run to the configured store.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fleetmon::display::render_report;
use fleetmon::{
    FleetCollector, FleetConfig, HostPoller, JsonLinesStore, MetricStore, SqliteStore, StoreConfig,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

type Collector = FleetCollector<HostPoller, Box<dyn MetricStore>>;

/// Fleet telemetry collector for per-host monitoring agents
#[derive(Parser, Debug)]
#[command(name = "fleetmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "fleetmon.toml")]
    config: PathBuf,

    /// Host to poll (repeatable); replaces the configured host list
    #[arg(short = 'H', long = "host")]
    hosts: Vec<String>,

    /// Run a single collection and exit
    #[arg(long)]
    once: bool,

    /// Seconds between collection runs (overrides config)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Append batches to this JSON Lines file
    #[arg(long, conflicts_with = "store_sqlite")]
    store_jsonl: Option<PathBuf>,

    /// Commit batches to this SQLite database (e.g. sqlite://metrics.db)
    #[arg(long)]
    store_sqlite: Option<String>,

    /// Do not print per-run reports
    #[arg(short, long)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &Args) -> Result<FleetConfig> {
    let mut config = if args.config.exists() {
        FleetConfig::load(&args.config)?
    } else if !args.hosts.is_empty() {
        FleetConfig::with_hosts(Vec::new())
    } else {
        bail!(
            "config file {} not found and no --host given",
            args.config.display()
        );
    };

    if !args.hosts.is_empty() {
        config.hosts = args.hosts.clone();
    }
    if let Some(interval) = args.interval {
        config.interval_secs = interval;
    }
    if let Some(ref path) = args.store_jsonl {
        config.store = StoreConfig::Jsonl { path: path.clone() };
    }
    if let Some(ref url) = args.store_sqlite {
        config.store = StoreConfig::Sqlite { url: url.clone() };
    }

    config.validate()?;
    Ok(config)
}

async fn open_store(config: &StoreConfig) -> Result<Box<dyn MetricStore>> {
    let store: Box<dyn MetricStore> = match config {
        StoreConfig::Jsonl { path } => {
            info!(path = %path.display(), "appending batches to JSON Lines file");
            Box::new(JsonLinesStore::new(path))
        }
        StoreConfig::Sqlite { url } => Box::new(
            SqliteStore::connect(url)
                .await
                .with_context(|| format!("Failed to open SQLite store {url}"))?,
        ),
    };
    Ok(store)
}

/// Flips to `true` on the first Ctrl-C and stays there, so an interrupt
/// that lands while a batch is committing is still seen afterwards.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
        tx.closed().await;
    });
    rx
}

async fn interrupted(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run once, returning an error for a failed commit
async fn run_once(
    collector: &Collector,
    hosts: &[String],
    shutdown: watch::Receiver<bool>,
    quiet: bool,
) -> Result<()> {
    let report = collector
        .collect_until(hosts, interrupted(shutdown))
        .await
        .context("Collection run failed")?;
    match report {
        Some(report) if !quiet => print!("{}", render_report(&report)),
        Some(_) => {}
        None => warn!("interrupted while polling; run discarded, nothing committed"),
    }
    Ok(())
}

/// Collect every `interval` until interrupted or `duration` elapses.
/// A failed commit is logged and the next run proceeds. An interrupt that
/// arrives once a run is committing lets that commit finish.
async fn run_loop(
    collector: &Collector,
    hosts: &[String],
    interval: Duration,
    duration: Option<Duration>,
    shutdown: watch::Receiver<bool>,
    quiet: bool,
) {
    let start = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = interrupted(shutdown.clone()) => {
                info!("interrupted; stopping");
                break;
            }
        }

        if let Some(dur) = duration {
            if start.elapsed() >= dur {
                break;
            }
        }

        match collector.collect_until(hosts, interrupted(shutdown.clone())).await {
            Ok(Some(report)) => {
                if !quiet {
                    print!("{}", render_report(&report));
                }
            }
            Ok(None) => {
                warn!("interrupted while polling; run discarded, nothing committed");
                break;
            }
            Err(e) => {
                let detail = format!("{:#}", anyhow::Error::new(e));
                error!(error = %detail, "collection run failed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json_logs);

    let config = load_config(&args)?;
    let poller = HostPoller::new(
        config.agent.port,
        config.agent.timeout(),
        config.agent.chart_failure,
    )
    .context("Failed to build HTTP client")?;
    let store = open_store(&config.store).await?;
    let collector = FleetCollector::new(poller, store).with_concurrency(config.agent.concurrency);

    info!(
        hosts = config.hosts.len(),
        interval_secs = config.interval_secs,
        concurrency = collector.concurrency(),
        "starting collector"
    );

    let shutdown = shutdown_signal();
    if args.once {
        run_once(&collector, &config.hosts, shutdown, args.quiet).await
    } else {
        run_loop(
            &collector,
            &config.hosts,
            config.interval(),
            args.duration.map(Duration::from_secs),
            shutdown,
            args.quiet,
        )
        .await;
        Ok(())
    }
}
