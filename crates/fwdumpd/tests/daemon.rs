//! Integration tests for fwdumpd.
//!
//! Each test starts the daemon in a background task with a SimSdk backend,
//! then talks to it over a real SEQPACKET connection and/or injects fault
//! notifications on the simulated event channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fwdump_sdk::{HealthCause, HealthEvent, HealthSeverity, SimSdk};
use fwdumpd::{run_daemon, Config};
use tempfile::TempDir;

const BUSY_REPLY: &str = "Generating dump...\nFailed, Another dump task is currently running\n";
const ALREADY_TAKEN_REPLY: &str =
    "Generating dump...\nFailed, FW event occured and a dump was already taken\n";
const FAILED_REPLY: &str = "Generating dump...\nFailed to create FW/SDK dump file(s)\n";
const SUCCESS_PREFIX: &str = "Generating dump...\nFinished successfully\nOutput = ";

fn test_config(temp: &TempDir) -> Config {
    Config {
        socket_path: temp.path().join("fwdumpd.sock"),
        dump_dir: temp.path().join("dumps"),
        socket_timeout_secs: 5,
        cooldown_secs: 0,
        event_log_limit: 100,
        retention_kinds: 2,
        retention_per_kind: 15,
    }
}

async fn start_daemon(config: Config, sdk: Arc<SimSdk>) {
    let socket = config.socket_path.clone();
    tokio::spawn(async move {
        if let Err(e) = run_daemon(config, sdk).await {
            eprintln!("daemon exited with error: {e:#}");
        }
    });
    for _ in 0..200 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon socket never appeared");
}

/// One blocking request/reply exchange, off the async runtime.
async fn request(socket: &Path, req: &str) -> String {
    let socket = socket.to_path_buf();
    let req = req.to_string();
    tokio::task::spawn_blocking(move || {
        fwdump_ipc::client::request(&socket, &req, Duration::from_secs(10)).unwrap()
    })
    .await
    .unwrap()
}

fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(prefix))
                .unwrap_or(false)
        })
        .collect()
}

async fn wait_for_dump(dir: &Path) {
    for _ in 0..100 {
        if !files_with_prefix(dir, "sdkdump_").is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("no sdk dump appeared in {}", dir.display());
}

fn firmware_event() -> HealthEvent {
    HealthEvent {
        cause: HealthCause::Firmware,
        severity: HealthSeverity::Critical,
        source_id: 1,
    }
}

fn timeout_event() -> HealthEvent {
    HealthEvent {
        cause: HealthCause::CommandTimeout,
        severity: HealthSeverity::Error,
        source_id: 2,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_with_default_dir_succeeds() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let dump_dir = config.dump_dir.clone();
    let socket = config.socket_path.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    start_daemon(config, sdk).await;

    let reply = request(&socket, "None").await;
    assert!(reply.starts_with(SUCCESS_PREFIX), "unexpected reply: {reply}");
    assert!(
        reply.contains(&format!("Output = {}/sdkdump_", dump_dir.display())),
        "unexpected reply: {reply}"
    );
    assert_eq!(files_with_prefix(&dump_dir, "fwdump_").len(), 1);
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_requested_dir_becomes_output_prefix() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let custom = temp.path().join("custom");
    std::fs::create_dir_all(&custom).unwrap();
    let sdk = Arc::new(SimSdk::open().unwrap());
    start_daemon(config, sdk).await;

    let reply = request(&socket, custom.to_str().unwrap()).await;
    assert!(
        reply.contains(&format!("Output = {}/sdkdump_", custom.display())),
        "unexpected reply: {reply}"
    );
    assert_eq!(files_with_prefix(&custom, "sdkdump_").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_request_while_dump_in_flight_gets_busy() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let dump_dir = config.dump_dir.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    sdk.set_dump_delay(Duration::from_millis(600));
    start_daemon(config, sdk).await;

    let first_socket = socket.clone();
    let first = tokio::spawn(async move { request(&first_socket, "None").await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    // requested path is irrelevant for the busy reply
    let busy = request(&socket, "/custom/dir").await;
    assert_eq!(busy, BUSY_REPLY);

    let reply = first.await.unwrap();
    assert!(reply.starts_with(SUCCESS_PREFIX), "unexpected reply: {reply}");
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_firmware_fault_consumes_dump_allowance() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let dump_dir = config.dump_dir.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    start_daemon(config.clone(), sdk.clone()).await;

    sdk.inject(&firmware_event()).unwrap();
    wait_for_dump(&dump_dir).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // a later request is refused: the fault dump was already taken
    let reply = request(&socket, "None").await;
    assert_eq!(reply, ALREADY_TAKEN_REPLY);

    // a later fault produces no further dump
    let before = files_with_prefix(&dump_dir, "sdkdump_").len();
    sdk.inject(&firmware_event()).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_firmware_fault_leaves_requests_allowed() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let dump_dir = config.dump_dir.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    start_daemon(config, sdk.clone()).await;

    sdk.inject(&timeout_event()).unwrap();
    wait_for_dump(&dump_dir).await;
    // let the worker finish and keep the timestamp suffix distinct
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let reply = request(&socket, "None").await;
    assert!(reply.starts_with(SUCCESS_PREFIX), "unexpected reply: {reply}");
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fault_and_request_never_dump_concurrently() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let dump_dir = config.dump_dir.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    sdk.set_dump_delay(Duration::from_millis(500));
    start_daemon(config, sdk.clone()).await;

    // fault and request land in the same instant; whichever path claims the
    // slot first runs, the other is skipped or refused
    sdk.inject(&timeout_event()).unwrap();
    let reply = request(&socket, "None").await;
    assert!(
        reply == BUSY_REPLY || reply.starts_with(SUCCESS_PREFIX),
        "unexpected reply: {reply}"
    );

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), 1);
    assert_eq!(files_with_prefix(&dump_dir, "fwdump_").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_generation_failure_reports_failure() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let dump_dir = config.dump_dir.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    sdk.set_fail_fast(true);
    start_daemon(config, sdk).await;

    let reply = request(&socket, "None").await;
    assert_eq!(reply, FAILED_REPLY);
    // the full dump was still attempted independently
    assert_eq!(files_with_prefix(&dump_dir, "sdkdump_").len(), 1);
    assert_eq!(files_with_prefix(&dump_dir, "fwdump_").len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_new_connection_preempts_idle_one() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    let socket = config.socket_path.clone();
    let sdk = Arc::new(SimSdk::open().unwrap());
    start_daemon(config, sdk).await;

    // first client connects but never sends; a second client must still be
    // served
    let idle_socket = socket.clone();
    let _idle = tokio::task::spawn_blocking(move || {
        fwdump_ipc::UdsConnection::connect(&idle_socket).unwrap()
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reply = request(&socket, "None").await;
    assert!(reply.starts_with(SUCCESS_PREFIX), "unexpected reply: {reply}");
}
