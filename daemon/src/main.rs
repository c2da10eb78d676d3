//! txflow daemon: watches a node and keeps tracked users' transaction
//! ledgers current.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use txflow_chain::{BitcoindClient, ChainFeed};
use txflow_ingest::{
    resync, BlockListener, IngestConfig, IngestMetrics, MempoolListener, Pipeline, PipelineDeps,
    ShutdownController,
};
use txflow_notify::BroadcastNotifier;
use txflow_store::MemoryStore;
use txflow_types::{NetworkId, RateRecord, SystemClock, User};
use txflow_utils::{format_duration, init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "txflow-daemon", about = "Transaction correlation daemon")]
struct Cli {
    /// Network the node serves: "main" or "test".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "TXFLOW_NETWORK")]
    network: Option<String>,

    /// Node JSON-RPC endpoint (defaults to localhost on the network's port).
    #[arg(long, env = "TXFLOW_NODE_RPC_URL")]
    node_rpc_url: Option<String>,

    #[arg(long, env = "TXFLOW_NODE_RPC_USER")]
    node_rpc_user: Option<String>,

    #[arg(long, env = "TXFLOW_NODE_RPC_PASSWORD", hide_env_values = true)]
    node_rpc_password: Option<String>,

    /// Maximum transactions processed at once per trigger.
    #[arg(long, env = "TXFLOW_MAX_CONCURRENT_TXS")]
    max_concurrent_txs: Option<usize>,

    /// JSON file with the tracked users and their wallets.
    #[arg(long, env = "TXFLOW_USERS")]
    users: Option<PathBuf>,

    /// JSON file with exchange-rate records.
    #[arg(long, env = "TXFLOW_RATES")]
    rates: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TXFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TXFLOW_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Follow the mempool and new blocks until interrupted.
    Run {
        /// Last block already handled; the block listener starts after it.
        /// Defaults to the current tip.
        #[arg(long)]
        start_after: Option<i64>,
    },
    /// Replay a range of historical blocks and exit.
    Resync {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
    },
}

fn merge_config(cli: &Cli, base: IngestConfig) -> anyhow::Result<IngestConfig> {
    let mut config = base;
    if let Some(network) = &cli.network {
        let network: NetworkId = network.parse()?;
        if config.network != network && cli.node_rpc_url.is_none() {
            config.node_rpc_url = format!("http://127.0.0.1:{}", network.default_rpc_port());
        }
        config.network = network;
    }
    if let Some(url) = &cli.node_rpc_url {
        config.node_rpc_url = url.clone();
    }
    if cli.node_rpc_user.is_some() {
        config.node_rpc_user = cli.node_rpc_user.clone();
    }
    if cli.node_rpc_password.is_some() {
        config.node_rpc_password = cli.node_rpc_password.clone();
    }
    if let Some(n) = cli.max_concurrent_txs {
        config.max_concurrent_txs = n;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "human" => LogFormat::Human,
            other => anyhow::bail!("unknown log format {other:?}"),
        };
    }
    config.validate()?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Log every published notification. Stands in for the client transport.
fn spawn_notification_logger(notifier: &BroadcastNotifier) {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::info!(topic = %event.topic, payload = %event.payload, "notification"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "notification logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Rebuild the address index every `every` until shutdown.
fn spawn_index_refresh(
    pipeline: Arc<Pipeline>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = pipeline.refresh_index().await {
                        tracing::warn!(error = %e, "address index refresh failed");
                    }
                }
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => IngestConfig::from_toml_file(&path.to_string_lossy())?,
        None => IngestConfig::default(),
    };
    let config = merge_config(&cli, base)?;
    init_logging(config.log_format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &cli.users {
        let users: Vec<User> = read_json(path)?;
        tracing::info!(users = users.len(), "loaded tracked users");
        for user in users {
            store.put_user(user);
        }
    }
    if let Some(path) = &cli.rates {
        let rates: Vec<RateRecord> = read_json(path)?;
        for rate in rates {
            store.record_rate(rate);
        }
    }

    let node = Arc::new(BitcoindClient::new(
        config.node_rpc_url.clone(),
        config.node_rpc_user.clone(),
        config.node_rpc_password.clone(),
        config.rpc_timeout(),
    )?);
    let notifier = Arc::new(BroadcastNotifier::default());
    spawn_notification_logger(&notifier);

    let metrics = Arc::new(IngestMetrics::new());
    let deps = PipelineDeps {
        node: node.clone(),
        users: store.clone(),
        ledger: store.clone(),
        rates: store.clone(),
        notifier,
        clock: Arc::new(SystemClock),
    };
    let pipeline = Arc::new(Pipeline::start(&config, deps, metrics.clone()).await?);
    let feed: Arc<dyn ChainFeed> = node.clone();
    let shutdown = Arc::new(ShutdownController::new());
    let started = Instant::now();

    match cli.command {
        Command::Run { start_after } => {
            tracing::info!(
                "starting txflow on {} network (node {})",
                config.network.as_str(),
                node.url(),
            );

            let mempool = Arc::new(MempoolListener::new(pipeline.clone(), feed.clone(), &config));
            let blocks = Arc::new(BlockListener::new(
                pipeline.clone(),
                feed.clone(),
                &config,
                start_after,
            ));

            let mut tasks = vec![spawn_index_refresh(
                pipeline.clone(),
                config.address_index_refresh(),
                shutdown.subscribe(),
            )];
            let rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move { mempool.run(rx).await }));
            let rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move { blocks.run(rx).await }));

            shutdown.wait_for_signal().await;
            for task in tasks {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "listener task failed");
                }
            }
        }
        Command::Resync { from, to } => {
            let signal = shutdown.clone();
            tokio::spawn(async move { signal.wait_for_signal().await });
            let report = resync(pipeline.clone(), feed, &config, from, to, shutdown.subscribe())
                .await?;
            tracing::info!(
                blocks = report.blocks,
                matched = report.matched,
                "resync took {}",
                format_duration(started.elapsed())
            );
        }
    }

    tracing::info!(
        seen = metrics.transactions_seen.get(),
        matched = metrics.transactions_matched.get(),
        uptime = %format_duration(started.elapsed()),
        "txflow daemon exited cleanly"
    );
    tracing::debug!("{}", metrics.encode());
    Ok(())
}
