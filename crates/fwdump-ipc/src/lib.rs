//! # fwdump-ipc
//!
//! Control-socket plumbing shared by `fwdumpd` and the `fwdump` client.
//!
//! The transport is a `SOCK_SEQPACKET` Unix socket: connection oriented but
//! message framed, so one `recv` yields exactly one request or reply and no
//! stream reassembly is needed. Requests and replies are plain UTF-8 per the
//! daemon's wire protocol (see [`proto`]).

pub mod client;
pub mod proto;
pub mod socket;

pub use proto::{DumpReply, DumpRequest, ProtoError};
pub use socket::{UdsConnection, UdsListener};

/// Default daemon control socket path
pub fn default_socket_path() -> &'static str {
    "/var/run/fwdumpd/fwdumpd.sock"
}
