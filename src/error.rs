//! Error types for signalbox

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Control channel closed")]
    ChannelClosed,

    #[error("Control channel error: {0}")]
    Transport(String),

    #[error("Malformed control message: {0}")]
    MalformedMessage(#[source] serde_json::Error),

    #[error("Malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No local description after gathering completed")]
    MissingLocalDescription,

    #[error("Unsupported session description type")]
    UnsupportedDescription,

    #[error("Data stream closed")]
    StreamClosed,

    #[error("Peer connection error: {0}")]
    Engine(#[from] webrtc::Error),
}

impl Error {
    /// Send failures caused by the data stream already being closed end the
    /// heartbeat normally instead of counting as an error.
    pub fn is_expected_close(&self) -> bool {
        matches!(self, Error::StreamClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
