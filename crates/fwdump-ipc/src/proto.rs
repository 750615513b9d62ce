//! Wire protocol between the `fwdump` client and the daemon.
//!
//! A request is an opaque UTF-8 string: the literal `"None"` selects the
//! daemon's default dump directory, anything else is an absolute output
//! directory. A reply is a UTF-8 status text that always opens with the
//! preamble line; the exact strings below are the wire format and must not
//! drift (the `occured` spelling included).

use std::path::PathBuf;

use thiserror::Error;

/// First line of every reply.
pub const REPLY_PREAMBLE: &str = "Generating dump...\n";

/// Request token selecting the default dump directory.
pub const DEFAULT_DIR_TOKEN: &str = "None";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    #[error("empty request")]
    Empty,
    #[error("request is not valid UTF-8")]
    NotUtf8,
}

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    /// Requested output directory, `None` meaning "use the default".
    pub requested_dir: Option<PathBuf>,
}

impl DumpRequest {
    /// Parse one raw request message.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtoError> {
        let text = std::str::from_utf8(raw).map_err(|_| ProtoError::NotUtf8)?;
        if text.is_empty() {
            return Err(ProtoError::Empty);
        }
        let requested_dir = if text == DEFAULT_DIR_TOKEN {
            None
        } else {
            Some(PathBuf::from(text))
        };
        Ok(Self { requested_dir })
    }
}

/// Daemon reply, rendered to the fixed wire strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpReply {
    /// Both dump files were produced; `output` is the full-dump path.
    Finished { output: PathBuf },
    /// Another dump task is already running.
    Busy,
    /// A fault-triggered dump already consumed the per-lifetime allowance.
    AlreadyTaken,
    /// One or both generation calls failed.
    GenerationFailed,
}

impl DumpReply {
    pub fn render(&self) -> String {
        let mut reply = String::from(REPLY_PREAMBLE);
        match self {
            DumpReply::Finished { output } => {
                reply.push_str("Finished successfully\nOutput = ");
                reply.push_str(&output.display().to_string());
                reply.push('\n');
            }
            DumpReply::Busy => {
                reply.push_str("Failed, Another dump task is currently running\n");
            }
            DumpReply::AlreadyTaken => {
                reply.push_str("Failed, FW event occured and a dump was already taken\n");
            }
            DumpReply::GenerationFailed => {
                reply.push_str("Failed to create FW/SDK dump file(s)\n");
            }
        }
        reply
    }
}
