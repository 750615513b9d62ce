//! fwdumpd - firmware/SDK debug dump daemon
//!
//! Listens for fault notifications from the switch SDK and for operator
//! requests on a local control socket; see the crate docs for the
//! architecture.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fwdumpd::{run_daemon, Config};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fwdumpd")]
#[command(version, about = "Firmware/SDK debug dump daemon", long_about = None)]
struct Cli {
    /// Config file path (default: /etc/fwdumpd/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control socket path override
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Dump directory override
    #[arg(long)]
    dump_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("fwdumpd=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(socket) = cli.socket {
        config.socket_path = socket;
    }
    if let Some(dump_dir) = cli.dump_dir {
        config.dump_dir = dump_dir;
    }

    // No hardware SDK binding is linked into this build; a daemon without
    // its subsystem is useless, so a channel-open failure is fatal.
    let sdk = Arc::new(fwdump_sdk::SimSdk::open().context("failed to open SDK event channel")?);
    warn!("running with the simulation SDK backend");

    run_daemon(config, sdk).await
}
