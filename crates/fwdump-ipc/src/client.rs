//! Blocking client helper used by the `fwdump` binary and tests.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::socket::UdsConnection;

/// Send one request to the daemon and return its raw reply text.
pub fn request(socket_path: &Path, request: &str, timeout: Duration) -> Result<String> {
    let conn = UdsConnection::connect(socket_path).with_context(|| {
        format!(
            "failed to connect to daemon at {}",
            socket_path.display()
        )
    })?;
    conn.set_timeout(timeout)
        .context("failed to set socket timeout")?;
    conn.send(request.as_bytes())
        .context("failed to send request to daemon")?;
    let reply = conn
        .recv()
        .context("failed to receive reply from daemon")?;
    if reply.is_empty() {
        bail!("daemon closed the connection without a reply");
    }
    Ok(String::from_utf8_lossy(&reply).into_owned())
}
