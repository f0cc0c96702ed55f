//! Per-connection negotiation state machine
//!
//! One [`NegotiationSession`] exists per accepted control channel. It owns a
//! single peer connection and reads control messages strictly in order: the
//! next message is not read until the current offer/answer sequence,
//! including the wait for candidate gathering, has finished.
//!
//! Writes to the control channel go through [`Outbound`], a queue drained by
//! one writer task, so the message loop and engine callbacks never write to
//! the socket concurrently.

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::heartbeat;
use super::peer::{DataStream, PeerConnection, PeerConnector};
use super::relay;
use super::types::{
    generate_session_id, ControlMessage, IceConnectionState, MessageKind, Role, RoleChange,
    SessionDescription,
};
use crate::config::RtcConfig;
use crate::{Error, Result};

/// Sending half of the single-writer control-channel queue
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl Outbound {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControlMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, msg: ControlMessage) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::ChannelClosed)
    }
}

/// Per-session settings taken from [`RtcConfig`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Label of the placeholder stream created on every connection
    pub data_stream_label: String,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_stream_label: "noop".to_string(),
            heartbeat_interval: heartbeat::DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl From<&RtcConfig> for SessionConfig {
    fn from(config: &RtcConfig) -> Self {
        Self {
            data_stream_label: config.data_stream_label.clone(),
            heartbeat_interval: config.heartbeat_interval(),
        }
    }
}

pub struct NegotiationSession {
    id: String,
    connection: Arc<dyn PeerConnection>,
    outbound: Outbound,
    role: Role,
}

impl NegotiationSession {
    /// Create the peer connection and register event subscriptions before
    /// any control message is processed.
    pub async fn start(
        connector: &dyn PeerConnector,
        outbound: Outbound,
        config: &SessionConfig,
    ) -> Result<Self> {
        let id = generate_session_id();
        let connection = connector.create_connection().await?;

        // Placeholder stream so an SCTP association gets negotiated
        if let Err(e) = connection
            .create_data_stream(&config.data_stream_label)
            .await
        {
            let _ = connection.close().await;
            return Err(e);
        }

        relay::install(connection.as_ref(), outbound.clone());

        let session_id = id.clone();
        connection.on_ice_state_change(Box::new(move |state: IceConnectionState| {
            info!("[Session {}] ICE connection state has changed: {}", session_id, state);
        }));

        let period = config.heartbeat_interval;
        connection.on_data_stream(Box::new(move |stream: Arc<dyn DataStream>| {
            heartbeat::install(stream.as_ref(), period);
        }));

        info!("[Session {}] Negotiation session started", id);

        Ok(Self {
            id,
            connection,
            outbound,
            role: Role::Unstarted,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Process control frames until the channel ends or a message fails.
    ///
    /// The peer connection is closed before returning either way.
    pub async fn run<S>(mut self, mut inbound: S) -> Result<()>
    where
        S: Stream<Item = Result<String>> + Unpin,
    {
        let result = self.message_loop(&mut inbound).await;

        if let Err(e) = self.connection.close().await {
            warn!("[Session {}] Failed to close peer connection: {}", self.id, e);
        }

        match &result {
            Ok(()) => info!("[Session {}] Control channel closed", self.id),
            Err(e) => warn!("[Session {}] Session aborted: {}", self.id, e),
        }
        result
    }

    async fn message_loop<S>(&mut self, inbound: &mut S) -> Result<()>
    where
        S: Stream<Item = Result<String>> + Unpin,
    {
        while let Some(frame) = inbound.next().await {
            let text = frame?;
            self.handle_frame(&text).await?;
        }
        Ok(())
    }

    /// Decode one raw control frame and dispatch it
    pub async fn handle_frame(&mut self, text: &str) -> Result<()> {
        trace!("[Session {}] Received: {}", self.id, text);
        let msg: ControlMessage = serde_json::from_str(text).map_err(Error::MalformedMessage)?;
        self.handle_message(msg).await
    }

    pub async fn handle_message(&mut self, msg: ControlMessage) -> Result<()> {
        let kind = msg.kind();
        debug!("[Session {}] Handling {}", self.id, kind);

        match kind {
            // Remote candidates are not applied: descriptions are exchanged
            // only after gathering, so they already carry every candidate.
            MessageKind::Candidate => Ok(()),
            MessageKind::RequestOffer => {
                self.assign_role(Role::Offerer);
                self.offer_sequence().await
            }
            MessageKind::Offer => {
                let desc = parse_description("offer", &msg.data)?;
                self.assign_role(Role::Answerer);
                self.connection.set_remote_description(desc).await?;
                self.answer_sequence().await
            }
            MessageKind::Answer => {
                let desc = parse_description("answer", &msg.data)?;
                if self.role != Role::Offerer {
                    warn!(
                        "[Session {}] Answer received while {}, applying anyway",
                        self.id, self.role
                    );
                }
                self.connection.set_remote_description(desc).await?;
                Ok(())
            }
            MessageKind::Unknown(event) => {
                debug!("[Session {}] Ignoring unknown event '{}'", self.id, event);
                Ok(())
            }
        }
    }

    fn assign_role(&mut self, next: Role) {
        match self.role.assign(next) {
            RoleChange::Initial => info!("[Session {}] Acting as {}", self.id, next),
            RoleChange::Repeat => {
                warn!("[Session {}] Re-negotiating as {}", self.id, next)
            }
            RoleChange::Switch { from } => warn!(
                "[Session {}] Role switched from {} to {}",
                self.id, from, next
            ),
        }
    }

    async fn offer_sequence(&self) -> Result<()> {
        let gathered = self.connection.gathering_complete().await;

        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(offer).await?;

        // Blocks the message loop until every candidate is known
        gathered.wait().await;

        let desc = self.gathered_description().await?;
        self.send(ControlMessage::offer(&desc)?)
    }

    async fn answer_sequence(&self) -> Result<()> {
        let gathered = self.connection.gathering_complete().await;

        let answer = self.connection.create_answer().await?;
        self.connection.set_local_description(answer).await?;

        gathered.wait().await;

        let desc = self.gathered_description().await?;
        self.send(ControlMessage::answer(&desc)?)
    }

    /// Local description read after gathering, so it embeds every candidate
    async fn gathered_description(&self) -> Result<SessionDescription> {
        self.connection
            .local_description()
            .await
            .ok_or(Error::MissingLocalDescription)
    }

    fn send(&self, msg: ControlMessage) -> Result<()> {
        let event = msg.event.clone();
        self.outbound.send(msg)?;
        info!("[Session {}] Sent {}", self.id, event);
        Ok(())
    }
}

fn parse_description(kind: &'static str, data: &str) -> Result<SessionDescription> {
    serde_json::from_str(data).map_err(|source| Error::MalformedPayload { kind, source })
}
