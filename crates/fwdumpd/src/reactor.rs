//! The event reactor.
//!
//! One task multiplexes the SDK fault-notification fd, the control-socket
//! listener, the active client connection, worker completions, and shutdown
//! signals. All daemon state lives here and is only mutated here; the
//! false-to-true transition of the single-flight slot therefore happens
//! strictly before any worker is spawned, and two triggers arriving
//! back-to-back can never both claim it.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;

use anyhow::{Context, Result};
use fwdump_ipc::{DumpRequest, UdsConnection, UdsListener};
use fwdump_sdk::{HealthCause, SwitchSdk};
use tokio::io::unix::AsyncFd;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::worker::{self, RequestVerdict, WorkerDone};

pub struct Reactor<S: SwitchSdk> {
    config: Arc<Config>,
    sdk: Arc<S>,
    listener: AsyncFd<UdsListener>,
    /// Readiness registration for the SDK event channel. The fd is owned by
    /// `sdk`, which this reactor keeps alive for its whole lifetime.
    event_fd: AsyncFd<RawFd>,
    /// The one retained client connection; a new inbound connection
    /// pre-empts it.
    conn: Option<AsyncFd<UdsConnection>>,
    dump_in_progress: bool,
    fault_dump_taken: bool,
    event_count: u32,
    in_flight: Option<JoinHandle<()>>,
    done_tx: mpsc::UnboundedSender<WorkerDone>,
    done_rx: mpsc::UnboundedReceiver<WorkerDone>,
}

impl<S: SwitchSdk> Reactor<S> {
    pub fn new(config: Arc<Config>, sdk: Arc<S>) -> Result<Self> {
        let listener = UdsListener::bind(&config.socket_path).with_context(|| {
            format!(
                "failed to bind control socket at {}",
                config.socket_path.display()
            )
        })?;
        let listener =
            AsyncFd::new(listener).context("failed to register control socket listener")?;
        let event_fd = AsyncFd::new(sdk.event_fd().as_raw_fd())
            .context("failed to register SDK event channel")?;
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            sdk,
            listener,
            event_fd,
            conn: None,
            dump_in_progress: false,
            fault_dump_taken: false,
            event_count: 0,
            in_flight: None,
            done_tx,
            done_rx,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        info!("main loop started, listening for events");

        loop {
            tokio::select! {
                ready = self.event_fd.readable() => {
                    match ready {
                        Ok(mut guard) => {
                            guard.clear_ready();
                            drop(guard);
                            self.on_fault_ready();
                        }
                        Err(e) => error!(error = %e, "wait on SDK event channel failed"),
                    }
                }
                ready = self.listener.readable() => {
                    match ready {
                        Ok(mut guard) => {
                            guard.clear_ready();
                            drop(guard);
                            self.on_listener_ready();
                        }
                        Err(e) => error!(error = %e, "wait on control socket failed"),
                    }
                }
                ready = conn_readable(&self.conn) => {
                    match ready {
                        Ok(()) => self.on_request_ready(),
                        Err(e) => {
                            error!(error = %e, "wait on client connection failed");
                            self.conn = None;
                        }
                    }
                }
                Some(done) = self.done_rx.recv() => {
                    self.on_worker_done(done);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("caught SIGINT, exiting");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("caught SIGTERM, exiting");
                    break;
                }
            }
        }

        self.drain().await;
        Ok(())
    }

    /// Fault notification path. Drains one event record and hands it to a
    /// worker; under storm conditions the notification is dropped.
    fn on_fault_ready(&mut self) {
        if fault_gated(
            self.event_count,
            self.config.event_log_limit,
            self.dump_in_progress,
        ) {
            return;
        }
        let event = match self.sdk.drain_event() {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "failed to receive event data from SDK channel");
                return;
            }
        };
        self.event_count += 1;

        let allowance_consumed = self.fault_dump_taken;
        if !allowance_consumed && event.cause == HealthCause::Firmware {
            self.fault_dump_taken = true;
        }
        self.dump_in_progress = true;
        let handle = worker::spawn_event_worker(
            self.sdk.clone(),
            self.config.clone(),
            event,
            allowance_consumed,
            self.done_tx.clone(),
        );
        self.in_flight = Some(handle);
    }

    /// New-connection path. Only one client is served at a time; the latest
    /// connection wins.
    fn on_listener_ready(&mut self) {
        loop {
            match self.listener.get_ref().accept() {
                Ok(conn) => {
                    if self.conn.take().is_some() {
                        debug!("dropping previous client connection");
                    }
                    if let Err(e) = conn.set_timeout(self.config.socket_timeout()) {
                        warn!(error = %e, "failed to set client socket timeout");
                    }
                    match AsyncFd::new(conn) {
                        Ok(registered) => self.conn = Some(registered),
                        Err(e) => error!(error = %e, "failed to register client connection"),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    error!(error = %e, "failed to accept client connection");
                    return;
                }
            }
        }
    }

    /// Active-connection path. Reads one request, decides the verdict here
    /// (the only place the single-flight slot is claimed) and hands the
    /// connection to a worker.
    fn on_request_ready(&mut self) {
        let Some(registered) = self.conn.take() else {
            return;
        };
        let conn = registered.into_inner();
        info!("dump requested by the user");

        let raw = match conn.recv() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "failed to read request from client");
                return;
            }
        };
        let requested_dir = match DumpRequest::parse(&raw) {
            Ok(request) => request.requested_dir,
            Err(e) => {
                // malformed request: proceed with the default directory
                error!(error = %e, "failed to get request from client");
                None
            }
        };

        let verdict = request_verdict(self.dump_in_progress, self.fault_dump_taken);
        if verdict != RequestVerdict::Busy {
            self.dump_in_progress = true;
        }
        let handle = worker::spawn_request_worker(
            self.sdk.clone(),
            self.config.clone(),
            conn,
            verdict,
            requested_dir,
            self.done_tx.clone(),
        );
        if verdict != RequestVerdict::Busy {
            self.in_flight = Some(handle);
        }
    }

    fn on_worker_done(&mut self, done: WorkerDone) {
        debug!(trigger = ?done.trigger, success = done.success, "dump worker finished");
        self.dump_in_progress = false;
        self.in_flight = None;
    }

    /// Shutdown drain: wait for an in-flight dump instead of racing it, then
    /// remove the socket file.
    async fn drain(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            info!("waiting for in-flight dump to finish");
            if let Err(e) = handle.await {
                error!(error = %e, "dump worker failed during shutdown");
            }
        }
        let _ = std::fs::remove_file(&self.config.socket_path);
    }
}

/// Readiness future for the optional active connection; pends forever while
/// no connection is registered.
async fn conn_readable(slot: &Option<AsyncFd<UdsConnection>>) -> io::Result<()> {
    match slot {
        Some(conn) => conn.readable().await.map(|_guard| ()),
        None => std::future::pending().await,
    }
}

/// Storm guard for the fault path: drop the notification once the event
/// budget is spent or while a dump is running.
fn fault_gated(event_count: u32, limit: u32, dump_in_progress: bool) -> bool {
    event_count >= limit || dump_in_progress
}

/// Decide what a freshly read client request gets.
fn request_verdict(dump_in_progress: bool, fault_dump_taken: bool) -> RequestVerdict {
    if dump_in_progress {
        RequestVerdict::Busy
    } else if fault_dump_taken {
        RequestVerdict::AlreadyTaken
    } else {
        RequestVerdict::Run
    }
}
