//! Simulation backend.
//!
//! Stands in for the hardware SDK when none is linked: the event channel is
//! a SEQPACKET socketpair (one bincode-framed record per notification) and
//! the dump calls write small snapshot files with the real naming scheme.
//! Failure toggles and an artificial dump latency make the daemon's
//! partial-failure and single-flight paths testable.

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use fwdump_ipc::UdsConnection;
use tracing::debug;

use crate::{dump_timestamp, HealthEvent, SdkError, SwitchSdk};

pub struct SimSdk {
    /// Readiness side handed to the reactor.
    rx: UdsConnection,
    /// Kept open so the rx side never reports end-of-stream; also the
    /// injection point for simulated faults.
    tx: UdsConnection,
    fail_fast: AtomicBool,
    fail_full: AtomicBool,
    dump_delay_ms: AtomicU64,
}

impl SimSdk {
    pub fn open() -> Result<Self, SdkError> {
        let (tx, rx) = UdsConnection::pair().map_err(SdkError::ChannelOpen)?;
        // drain_event must not wedge the caller if it ever races a spurious
        // readiness notification
        rx.set_timeout(Duration::from_secs(1))
            .map_err(SdkError::ChannelOpen)?;
        Ok(Self {
            rx,
            tx,
            fail_fast: AtomicBool::new(false),
            fail_full: AtomicBool::new(false),
            dump_delay_ms: AtomicU64::new(0),
        })
    }

    /// Queue one fault notification on the event channel.
    pub fn inject(&self, event: &HealthEvent) -> Result<(), SdkError> {
        let frame =
            bincode::serialize(event).map_err(|e| SdkError::BadEventRecord(e.to_string()))?;
        self.tx.send(&frame).map_err(SdkError::ChannelSend)?;
        debug!(?event, "injected simulated health event");
        Ok(())
    }

    /// Make the fast ("extra info") dump call fail.
    pub fn set_fail_fast(&self, fail: bool) {
        self.fail_fast.store(fail, Ordering::Relaxed);
    }

    /// Make the full dump call fail.
    pub fn set_fail_full(&self, fail: bool) {
        self.fail_full.store(fail, Ordering::Relaxed);
    }

    /// Stretch the fast dump call by `delay`, to hold the single-flight slot
    /// open in tests.
    pub fn set_dump_delay(&self, delay: Duration) {
        self.dump_delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    fn write_snapshot(path: &Path, kind: &str) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "{kind} dump (simulated)")?;
        writeln!(file, "captured: {}", chrono::Local::now().to_rfc3339())?;
        file.sync_all()
    }
}

impl SwitchSdk for SimSdk {
    fn event_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }

    fn drain_event(&self) -> Result<HealthEvent, SdkError> {
        let frame = self.rx.recv().map_err(SdkError::ChannelRecv)?;
        bincode::deserialize(&frame).map_err(|e| SdkError::BadEventRecord(e.to_string()))
    }

    fn generate_fast_dump(&self, dir: &Path) -> Result<PathBuf, SdkError> {
        let delay = self.dump_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_fast.load(Ordering::Relaxed) {
            return Err(SdkError::DumpFailed {
                kind: "FW",
                source: io::Error::other("injected failure"),
            });
        }
        let path = dir.join(format!("fwdump_{}", dump_timestamp()));
        Self::write_snapshot(&path, "FW").map_err(|e| SdkError::DumpFailed {
            kind: "FW",
            source: e,
        })?;
        Ok(path)
    }

    fn generate_full_dump(&self, path: &Path) -> Result<(), SdkError> {
        if self.fail_full.load(Ordering::Relaxed) {
            return Err(SdkError::DumpFailed {
                kind: "SDK",
                source: io::Error::other("injected failure"),
            });
        }
        Self::write_snapshot(path, "SDK").map_err(|e| SdkError::DumpFailed {
            kind: "SDK",
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HealthCause, HealthSeverity};
    use tempfile::tempdir;

    fn event() -> HealthEvent {
        HealthEvent {
            cause: HealthCause::CommandTimeout,
            severity: HealthSeverity::Error,
            source_id: 3,
        }
    }

    #[test]
    fn test_inject_then_drain() {
        let sdk = SimSdk::open().unwrap();
        sdk.inject(&event()).unwrap();
        assert_eq!(sdk.drain_event().unwrap(), event());
    }

    #[test]
    fn test_fast_dump_writes_kind_prefixed_file() {
        let temp = tempdir().unwrap();
        let sdk = SimSdk::open().unwrap();
        let path = sdk.generate_fast_dump(temp.path()).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("fwdump_"));
        assert!(path.exists());
    }

    #[test]
    fn test_full_dump_respects_requested_path() {
        let temp = tempdir().unwrap();
        let sdk = SimSdk::open().unwrap();
        let path = temp.path().join("sdkdump_test");
        sdk.generate_full_dump(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_failure_injection() {
        let temp = tempdir().unwrap();
        let sdk = SimSdk::open().unwrap();
        sdk.set_fail_fast(true);
        assert!(sdk.generate_fast_dump(temp.path()).is_err());
        sdk.set_fail_full(true);
        assert!(sdk.generate_full_dump(&temp.path().join("sdkdump_x")).is_err());
    }

    #[test]
    fn test_full_dump_fails_on_missing_directory() {
        let sdk = SimSdk::open().unwrap();
        assert!(sdk
            .generate_full_dump(Path::new("/nonexistent/dir/sdkdump_x"))
            .is_err());
    }
}
