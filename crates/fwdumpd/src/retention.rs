//! Retention eviction for the dump directory.
//!
//! Coarse heuristic carried over from the original design: the signal is the
//! raw directory entry count, not a per-kind ledger. When the count exceeds
//! the threshold, the oldest regular file is evicted once per dump kind.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{error, info, warn};

/// Count entries in `dir` and evict the `kinds` oldest regular files if the
/// count exceeds `threshold`. A directory that cannot be opened means
/// nothing to evict.
pub fn enforce(dir: &Path, threshold: usize, kinds: usize) {
    let count = match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "failed to open dump directory");
            return;
        }
    };
    if count <= threshold {
        return;
    }
    info!(
        count,
        threshold, "dump file count reached maximum allowed, deleting oldest"
    );
    for _ in 0..kinds {
        if let Err(e) = evict_oldest(dir) {
            warn!(dir = %dir.display(), error = %e, "failed to evict oldest dump file");
        }
    }
}

/// Remove the oldest-by-mtime regular file in `dir`, if any.
fn evict_oldest(dir: &Path) -> io::Result<()> {
    let mut oldest: Option<(SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let mtime = meta.modified()?;
        if oldest.as_ref().map_or(true, |(t, _)| mtime < *t) {
            oldest = Some((mtime, entry.path()));
        }
    }
    if let Some((_, path)) = oldest {
        std::fs::remove_file(&path)?;
        info!(path = %path.display(), "evicted oldest dump file");
    }
    Ok(())
}
