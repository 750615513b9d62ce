//! Daemon configuration.
//!
//! Loaded from `/etc/fwdumpd/config.toml` when present (or a `--config`
//! override), with environment variables applied on top. Every field has a
//! default so a bare install runs without a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/fwdumpd/config.toml";
pub const DEFAULT_DUMP_DIR: &str = "/var/log/fwdumpd";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control socket the daemon listens on.
    pub socket_path: PathBuf,
    /// Default output directory for dump files.
    pub dump_dir: PathBuf,
    /// Per-connection send/receive timeout.
    pub socket_timeout_secs: u64,
    /// Pause between the fast and full dump calls, so back-to-back commands
    /// do not saturate the SDK command path.
    pub cooldown_secs: u64,
    /// Cap on fault notifications handled per process lifetime.
    pub event_log_limit: u32,
    /// Number of distinct dump kinds kept on disk (currently FW and SDK).
    pub retention_kinds: usize,
    /// Retained dump files per kind.
    pub retention_per_kind: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(fwdump_ipc::default_socket_path()),
            dump_dir: PathBuf::from(DEFAULT_DUMP_DIR),
            socket_timeout_secs: 10,
            cooldown_secs: 1,
            event_log_limit: 100,
            retention_kinds: 2,
            retention_per_kind: 15,
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH));
        let mut config = if path.exists() {
            debug!(path = %path.display(), "loading config file");
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FWDUMPD_SOCKET") {
            self.socket_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("FWDUMPD_DUMP_DIR") {
            self.dump_dir = PathBuf::from(dir);
        }
    }

    /// Directory entry count above which retention evicts. The `+2` is
    /// fixed headroom inherited from the original entry-count heuristic.
    pub fn retention_threshold(&self) -> usize {
        self.retention_per_kind * self.retention_kinds + 2
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
