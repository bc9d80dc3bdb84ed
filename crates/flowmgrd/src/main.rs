//! flowmgrd - OpenFlow flow-management daemon.
//!
//! Entry point: loads configuration, binds the southbound listener, and
//! serves switch connections until interrupted.

use anyhow::Context;
use clap::Parser;
use ofctl_flowmgrd::{ConnectionRegistry, ControllerConfig, FlowManager, OpenFlowChannel, OpenFlowSink};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "flowmgrd",
    about = "OpenFlow flow-management daemon with virtual-service load balancing"
)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address override (host:port).
    #[arg(short, long)]
    listen: Option<String>,

    /// Log filter directive (e.g. "info" or "ofctl_flowmgrd=debug").
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(filter: &str) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).context("invalid log filter")?)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    info!("--- Starting flowmgrd ---");

    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listener.bind_addr = listen;
    }
    config.validate()?;

    let registry = Arc::new(ConnectionRegistry::new());
    let sink = Arc::new(OpenFlowSink::new(registry.clone()));
    let manager = Arc::new(FlowManager::new(sink, config.service.clone()));
    let channel = OpenFlowChannel::new(manager.clone(), registry);

    let listener = TcpListener::bind(&config.listener.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listener.bind_addr))?;

    info!(
        addr = %config.listener.bind_addr,
        virtual_ip = %config.service.virtual_ip,
        service_port = config.service.service_port,
        backends = config.service.backends.len(),
        "listening for switches"
    );

    tokio::select! {
        result = channel.serve(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("received shutdown signal"),
    }

    let stats = manager.stats();
    info!(
        packets_in = stats.packets_in,
        rules_installed = stats.rules_installed,
        service_flows = stats.service_flows,
        "flowmgrd exiting"
    );
    Ok(())
}
