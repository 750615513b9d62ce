//! Dump workers.
//!
//! Each triggered dump runs on a blocking task off the reactor: the SDK
//! generation calls are synchronous, the cool-down is a plain sleep, and
//! client I/O is blocking with socket timeouts. Workers never touch daemon
//! state directly; any worker spawned while the single-flight slot was
//! claimed reports back over the completion channel on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fwdump_ipc::{DumpReply, UdsConnection};
use fwdump_sdk::{dump_timestamp, HealthEvent, SwitchSdk};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::retention;

/// What the reactor decided for an inbound client request, computed on the
/// reactor task so two back-to-back requests can never both win the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestVerdict {
    /// Another dump is in flight; reply busy, touch nothing.
    Busy,
    /// The per-lifetime fault dump allowance is spent; reply and release.
    AlreadyTaken,
    /// Run the dump sequence.
    Run,
}

#[derive(Debug, Clone, Copy)]
pub enum DumpTrigger {
    FaultEvent,
    ClientRequest,
}

/// Completion message releasing the single-flight slot.
#[derive(Debug)]
pub struct WorkerDone {
    pub trigger: DumpTrigger,
    pub success: bool,
}

/// Result of one two-phase dump sequence.
#[derive(Debug)]
pub struct DumpOutcome {
    pub success: bool,
    pub output_paths: Vec<PathBuf>,
    pub message: String,
}

/// Worker for a fault-notification dump. `allowance_consumed` is the
/// fault-dump flag as the reactor saw it before this event.
pub fn spawn_event_worker<S: SwitchSdk>(
    sdk: Arc<S>,
    config: Arc<Config>,
    event: HealthEvent,
    allowance_consumed: bool,
    done: UnboundedSender<WorkerDone>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        info!(
            severity = %event.severity,
            cause = %event.cause,
            source_id = event.source_id,
            "health event captured"
        );

        if allowance_consumed {
            debug!("fault dump already taken this lifetime, skipping");
            let _ = done.send(WorkerDone {
                trigger: DumpTrigger::FaultEvent,
                success: false,
            });
            return;
        }

        let outcome = run_dump_sequence(sdk.as_ref(), &config.dump_dir, config.cooldown());
        info!(success = outcome.success, message = %outcome.message, "event-triggered dump finished");

        retention::enforce(
            &config.dump_dir,
            config.retention_threshold(),
            config.retention_kinds,
        );
        let _ = done.send(WorkerDone {
            trigger: DumpTrigger::FaultEvent,
            success: outcome.success,
        });
    })
}

/// Worker for a client-requested dump. Owns the connection from here on.
pub fn spawn_request_worker<S: SwitchSdk>(
    sdk: Arc<S>,
    config: Arc<Config>,
    conn: UdsConnection,
    verdict: RequestVerdict,
    requested_dir: Option<PathBuf>,
    done: UnboundedSender<WorkerDone>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || match verdict {
        RequestVerdict::Busy => {
            send_reply(&conn, &DumpReply::Busy);
        }
        RequestVerdict::AlreadyTaken => {
            send_reply(&conn, &DumpReply::AlreadyTaken);
            drop(conn);

            // every served request ends with a retention check, dump or not
            retention::enforce(
                &config.dump_dir,
                config.retention_threshold(),
                config.retention_kinds,
            );
            let _ = done.send(WorkerDone {
                trigger: DumpTrigger::ClientRequest,
                success: false,
            });
        }
        RequestVerdict::Run => {
            let dir = requested_dir.unwrap_or_else(|| config.dump_dir.clone());
            let outcome = run_dump_sequence(sdk.as_ref(), &dir, config.cooldown());

            let reply = if outcome.success {
                // the full dump is the last path produced on success
                match outcome.output_paths.last() {
                    Some(output) => DumpReply::Finished {
                        output: output.clone(),
                    },
                    None => DumpReply::GenerationFailed,
                }
            } else {
                DumpReply::GenerationFailed
            };
            send_reply(&conn, &reply);
            drop(conn);

            // retention watches the configured directory even when the dump
            // went elsewhere
            retention::enforce(
                &config.dump_dir,
                config.retention_threshold(),
                config.retention_kinds,
            );
            let _ = done.send(WorkerDone {
                trigger: DumpTrigger::ClientRequest,
                success: outcome.success,
            });
        }
    })
}

/// The two-phase dump sequence: fast "extra info" dump, cool-down, full
/// dump. Each call's failure is logged and folded into the outcome without
/// aborting the other.
fn run_dump_sequence<S: SwitchSdk>(sdk: &S, dir: &Path, cooldown: Duration) -> DumpOutcome {
    let mut success = true;
    let mut output_paths = Vec::new();

    match sdk.generate_fast_dump(dir) {
        Ok(path) => {
            debug!(path = %path.display(), "FW dump file written");
            output_paths.push(path);
        }
        Err(e) => {
            error!(error = %e, "failed to generate FW dump file");
            success = false;
        }
    }

    std::thread::sleep(cooldown);

    let full_path = dir.join(format!("sdkdump_{}", dump_timestamp()));
    match sdk.generate_full_dump(&full_path) {
        Ok(()) => {
            debug!(path = %full_path.display(), "SDK dump file written");
            output_paths.push(full_path.clone());
        }
        Err(e) => {
            error!(error = %e, "failed to generate SDK dump file");
            success = false;
        }
    }

    let message = if success {
        format!("Output = {}", full_path.display())
    } else {
        "Failed to create FW/SDK dump file(s)".to_string()
    };
    DumpOutcome {
        success,
        output_paths,
        message,
    }
}

fn send_reply(conn: &UdsConnection, reply: &DumpReply) {
    if let Err(e) = conn.send(reply.render().as_bytes()) {
        error!(error = %e, "failed to send reply to client");
    }
}
