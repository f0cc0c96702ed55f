//! Peer-connection capability consumed by the negotiation session
//!
//! The session never touches an engine directly: it drives these traits, and
//! [`super::rtc`] implements them on top of webrtc-rs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::{CandidateInit, IceConnectionState, SessionDescription};
use crate::Result;

/// Called for every locally discovered connectivity candidate
pub type CandidateHandler = Box<dyn Fn(CandidateInit) + Send + Sync>;

/// Called on every ICE connection-state change
pub type IceStateHandler = Box<dyn Fn(IceConnectionState) + Send + Sync>;

/// Called when the remote side opens a data stream
pub type DataStreamHandler = Box<dyn Fn(Arc<dyn DataStream>) + Send + Sync>;

/// Called once when a data stream becomes open, with a handle to that stream.
///
/// The handle is created on open so a pending handler never keeps its own
/// stream alive.
pub type OpenHandler = Box<dyn FnOnce(Arc<dyn DataStream>) + Send + Sync>;

/// Creates peer connections; shared read-only by all sessions
#[async_trait]
pub trait PeerConnector: Send + Sync + 'static {
    async fn create_connection(&self) -> Result<Arc<dyn PeerConnection>>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_data_stream(&self, label: &str) -> Result<Arc<dyn DataStream>>;

    fn on_candidate(&self, handler: CandidateHandler);
    fn on_ice_state_change(&self, handler: IceStateHandler);
    fn on_data_stream(&self, handler: DataStreamHandler);

    async fn create_offer(&self) -> Result<SessionDescription>;
    async fn create_answer(&self) -> Result<SessionDescription>;
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Arm a one-shot barrier that fires when candidate gathering completes.
    ///
    /// Must be armed before the local description is set so no gathering
    /// progress is missed.
    async fn gathering_complete(&self) -> GatheringComplete;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait DataStream: Send + Sync {
    fn label(&self) -> &str;

    fn on_open(&self, handler: OpenHandler);

    /// Send a text message. Fails with [`crate::Error::StreamClosed`] once the
    /// stream is no longer open.
    async fn send_text(&self, text: String) -> Result<()>;
}

/// One-shot gathering-complete signal.
///
/// Waiting has no timeout: an engine that never finishes gathering suspends
/// the waiter indefinitely.
pub struct GatheringComplete {
    rx: mpsc::Receiver<()>,
}

impl GatheringComplete {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self { rx }
    }

    /// Suspend until gathering completes. A dropped sender also releases the
    /// waiter, since nothing can complete gathering afterwards.
    pub async fn wait(mut self) {
        let _ = self.rx.recv().await;
    }
}
