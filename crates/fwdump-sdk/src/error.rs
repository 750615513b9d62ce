use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("failed to open SDK event channel: {0}")]
    ChannelOpen(#[source] io::Error),

    #[error("failed to receive event data from SDK channel: {0}")]
    ChannelRecv(#[source] io::Error),

    #[error("failed to queue event on SDK channel: {0}")]
    ChannelSend(#[source] io::Error),

    #[error("malformed SDK event record: {0}")]
    BadEventRecord(String),

    #[error("{kind} dump generation failed: {source}")]
    DumpFailed {
        kind: &'static str,
        #[source]
        source: io::Error,
    },
}
