//! # fwdumpd
//!
//! Long-running diagnostic daemon that captures point-in-time debug dumps of
//! a managed switch subsystem.
//!
//! ## Architecture
//!
//! - [`reactor`] — single coordinating task multiplexing three sources: the
//!   SDK fault-notification fd, the control-socket listener, and the one
//!   active client connection. It owns all daemon state; dump workers report
//!   back over a completion channel, so the single-flight guarantee needs no
//!   cross-thread flags.
//! - [`worker`] — detached blocking tasks running the two-phase dump
//!   sequence (fast "extra info" dump, cool-down, full dump) and replying to
//!   the client for request-triggered dumps.
//! - [`retention`] — entry-count based eviction of the oldest dump files.
//!
//! At most one dump sequence runs at a time; a request arriving mid-dump is
//! answered with a busy reply, never queued. A firmware-fault dump is capped
//! at one per process lifetime.

pub mod config;
pub mod reactor;
pub mod retention;
pub mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use fwdump_sdk::SwitchSdk;
use tracing::info;

pub use config::Config;

/// Main daemon entry point.
pub async fn run_daemon<S: SwitchSdk>(config: Config, sdk: Arc<S>) -> Result<()> {
    info!(
        socket = %config.socket_path.display(),
        dump_dir = %config.dump_dir.display(),
        "starting fwdumpd"
    );

    std::fs::create_dir_all(&config.dump_dir).with_context(|| {
        format!(
            "failed to create dump directory {}",
            config.dump_dir.display()
        )
    })?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("failed to create socket directory {}", parent.display())
        })?;
    }

    let reactor = reactor::Reactor::new(Arc::new(config), sdk)?;
    reactor.run().await
}
