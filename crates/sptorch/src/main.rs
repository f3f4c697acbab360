//! Spanning-tree loop guard daemon.
//!
//! Reads topology events as JSON lines, from a recorded file (`--replay`) or
//! from stdin, and drives the loop guard with a loopback flow controller
//! that logs every drop rule.

use anyhow::Context;
use clap::Parser;
use sonic_sptorch::{
    init_logging, init_logging_pretty, LoopbackFlowController, ReplayEventSource, SptConfig,
    SptDaemon, SptOrch, SptOrchConfig, DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// SONiC spanning-tree loop guard
#[derive(Parser, Debug)]
#[command(name = "sptorchd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Replay a recorded JSON-lines event stream instead of reading stdin
    #[arg(short = 'r', long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = SptConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    if args.json_logs || config.logging.json {
        init_logging(level)?;
    } else {
        init_logging_pretty(level)?;
    }

    info!("sptorchd: Starting spanning-tree loop guard");
    info!(
        max_switches = config.topology.max_switches,
        drop_rule_priority = config.reconcile.drop_rule_priority,
        open_tree_downlinks = config.reconcile.open_tree_downlinks,
        retry_interval_ms = config.reconcile.retry_interval_ms,
        "sptorchd: Configuration loaded"
    );

    match run(&args, &config).await {
        Ok(()) => {
            info!("sptorchd: Daemon exiting normally");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "sptorchd: Daemon exiting with error");
            Err(e)
        }
    }
}

async fn run(args: &Args, config: &SptConfig) -> anyhow::Result<()> {
    let (ack_tx, ack_rx) = mpsc::unbounded_channel();
    let orch = SptOrch::new(
        SptOrchConfig::from(config),
        Arc::new(LoopbackFlowController::new(ack_tx)),
    );

    let source = match &args.replay {
        Some(path) => {
            info!(file = %path.display(), "sptorchd: Replaying event stream");
            ReplayEventSource::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?
        }
        None => ReplayEventSource::stdin(),
    };

    let mut daemon = SptDaemon::new(orch, source, ack_rx, config.retry_interval());
    daemon.run().await?;
    Ok(())
}
