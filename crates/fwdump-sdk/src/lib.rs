//! # fwdump-sdk
//!
//! Seam between `fwdumpd` and the switch SDK that actually produces debug
//! dumps. The daemon only depends on the [`SwitchSdk`] trait:
//!
//! - a readiness-reportable event fd for fault notifications,
//! - a drain operation consuming exactly one notification record,
//! - two synchronous dump-generation calls (fast "extra info" and full).
//!
//! A hardware binding is out of scope for this repo; [`sim::SimSdk`] stands
//! in for it and doubles as the test backend (events are injected over a
//! SEQPACKET socketpair, dumps are placeholder snapshot files).

pub mod error;
pub mod event;
pub mod sim;

pub use error::SdkError;
pub use event::{HealthCause, HealthEvent, HealthSeverity};
pub use sim::SimSdk;

use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};

/// Dump-producing switch SDK.
///
/// Both generation calls are synchronous and may block; callers run them off
/// the reactor thread.
pub trait SwitchSdk: Send + Sync + 'static {
    /// Fault notification handle. The reactor only waits for readiness on
    /// it; the payload is consumed via [`SwitchSdk::drain_event`].
    fn event_fd(&self) -> BorrowedFd<'_>;

    /// Consume exactly one pending fault notification.
    fn drain_event(&self) -> Result<HealthEvent, SdkError>;

    /// Produce the bounded "extra info" dump inside `dir`. The SDK picks the
    /// file name and returns the created path.
    fn generate_fast_dump(&self, dir: &Path) -> Result<PathBuf, SdkError>;

    /// Produce the full dump at `path`. May take considerably longer than
    /// the fast dump.
    fn generate_full_dump(&self, path: &Path) -> Result<(), SdkError>;
}

/// Timestamp suffix for dump file names, local time.
pub fn dump_timestamp() -> String {
    chrono::Local::now().format("%d_%m_%Y-%H_%M_%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_timestamp_shape() {
        let ts = dump_timestamp();
        // DD_MM_YYYY-HH_MM_SS
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.matches('_').count(), 4);
        assert_eq!(ts.matches('-').count(), 1);
    }
}
