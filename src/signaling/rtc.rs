//! webrtc-rs implementation of the peer-connection capability

use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice::udp_mux::{UDPMuxDefault, UDPMuxParams};
use webrtc::ice::udp_network::UDPNetwork;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use super::peer::{
    CandidateHandler, DataStream, DataStreamHandler, GatheringComplete, IceStateHandler,
    OpenHandler, PeerConnection, PeerConnector,
};
use super::types::{CandidateInit, IceConnectionState, SdpType, SessionDescription};
use crate::config::RtcConfig;
use crate::{Error, Result};

/// Builds [`RtcConnector`]s from [`RtcConfig`] plus an optional ICE listener
pub struct RtcConnectorBuilder {
    public_ip: Option<String>,
    include_loopback: bool,
    ice_socket: Option<UdpSocket>,
}

impl RtcConnectorBuilder {
    pub fn new(config: &RtcConfig) -> Self {
        Self {
            public_ip: config.public_ip.clone(),
            include_loopback: config.include_loopback,
            ice_socket: None,
        }
    }

    /// Serve all ICE traffic from one already-bound UDP socket
    pub fn with_ice_socket(mut self, socket: UdpSocket) -> Self {
        self.ice_socket = Some(socket);
        self
    }

    pub fn build(self) -> Result<RtcConnector> {
        let mut settings = SettingEngine::default();

        if let Some(ip) = self.public_ip {
            settings.set_nat_1to1_ips(vec![ip], RTCIceCandidateType::Host);
        }

        if self.include_loopback {
            settings.set_include_loopback_candidate(true);
        }

        if let Some(socket) = self.ice_socket {
            let udp_mux = UDPMuxDefault::new(UDPMuxParams::new(socket));
            settings.set_udp_network(UDPNetwork::Muxed(udp_mux));
        }

        let mut m = MediaEngine::default();
        m.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut m)?;

        let api = APIBuilder::new()
            .with_setting_engine(settings)
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        Ok(RtcConnector { api })
    }
}

/// Peer-connection factory backed by one webrtc-rs API instance
pub struct RtcConnector {
    api: API,
}

impl RtcConnector {
    pub fn builder(config: &RtcConfig) -> RtcConnectorBuilder {
        RtcConnectorBuilder::new(config)
    }
}

#[async_trait]
impl PeerConnector for RtcConnector {
    async fn create_connection(&self) -> Result<Arc<dyn PeerConnection>> {
        // No ICE servers: host candidates (or the public address hint) only
        let pc = self
            .api
            .new_peer_connection(RTCConfiguration::default())
            .await?;
        Ok(Arc::new(RtcConnection { pc: Arc::new(pc) }))
    }
}

pub struct RtcConnection {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerConnection for RtcConnection {
    async fn create_data_stream(&self, label: &str) -> Result<Arc<dyn DataStream>> {
        let dc = self.pc.create_data_channel(label, None).await?;
        Ok(Arc::new(RtcDataStream::new(dc)))
    }

    fn on_candidate(&self, handler: CandidateHandler) {
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                // None marks the end of gathering
                if let Some(c) = candidate {
                    match c.to_json() {
                        Ok(init) => handler(CandidateInit {
                            candidate: init.candidate,
                            sdp_mid: init.sdp_mid,
                            sdp_mline_index: init.sdp_mline_index,
                            username_fragment: init.username_fragment,
                        }),
                        Err(e) => warn!("Failed to serialize ICE candidate: {}", e),
                    }
                }
                Box::pin(async {})
            }));
    }

    fn on_ice_state_change(&self, handler: IceStateHandler) {
        self.pc
            .on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
                handler(ice_state_from_rtc(state));
                Box::pin(async {})
            }));
    }

    fn on_data_stream(&self, handler: DataStreamHandler) {
        self.pc
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                debug!("Remote opened data channel '{}'", dc.label());
                handler(Arc::new(RtcDataStream::new(dc)));
                Box::pin(async {})
            }));
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.pc.create_offer(None).await?;
        description_from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.pc.create_answer(None).await?;
        description_from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_local_description(description_to_rtc(desc)?).await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc.set_remote_description(description_to_rtc(desc)?).await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.pc.local_description().await?;
        description_from_rtc(desc).ok()
    }

    async fn gathering_complete(&self) -> GatheringComplete {
        GatheringComplete::new(self.pc.gathering_complete_promise().await)
    }

    async fn close(&self) -> Result<()> {
        self.pc.close().await?;
        info!("Peer connection closed");
        Ok(())
    }
}

pub struct RtcDataStream {
    dc: Arc<RTCDataChannel>,
    label: String,
}

impl RtcDataStream {
    fn new(dc: Arc<RTCDataChannel>) -> Self {
        let label = dc.label().to_string();
        Self { dc, label }
    }
}

#[async_trait]
impl DataStream for RtcDataStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_open(&self, handler: OpenHandler) {
        let dc = Arc::downgrade(&self.dc);
        self.dc.on_open(Box::new(move || {
            if let Some(dc) = dc.upgrade() {
                handler(Arc::new(RtcDataStream::new(dc)));
            }
            Box::pin(async {})
        }));
    }

    async fn send_text(&self, text: String) -> Result<()> {
        match self.dc.send_text(text).await {
            Ok(_) => Ok(()),
            Err(webrtc::Error::ErrClosedPipe) => Err(Error::StreamClosed),
            Err(e) => {
                if matches!(
                    self.dc.ready_state(),
                    RTCDataChannelState::Closing | RTCDataChannelState::Closed
                ) {
                    Err(Error::StreamClosed)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

fn description_to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => {
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            rollback.sdp = desc.sdp;
            rollback
        }
    };
    Ok(rtc)
}

fn description_from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => return Err(Error::UnsupportedDescription),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

fn ice_state_from_rtc(state: RTCIceConnectionState) -> IceConnectionState {
    match state {
        RTCIceConnectionState::New => IceConnectionState::New,
        RTCIceConnectionState::Checking => IceConnectionState::Checking,
        RTCIceConnectionState::Connected => IceConnectionState::Connected,
        RTCIceConnectionState::Completed => IceConnectionState::Completed,
        RTCIceConnectionState::Disconnected => IceConnectionState::Disconnected,
        RTCIceConnectionState::Failed => IceConnectionState::Failed,
        RTCIceConnectionState::Closed => IceConnectionState::Closed,
        RTCIceConnectionState::Unspecified => IceConnectionState::Unspecified,
    }
}
