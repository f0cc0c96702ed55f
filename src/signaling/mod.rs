//! Peer-connection negotiation over a JSON control channel
//!
//! Each control channel drives one peer connection through a
//! [`NegotiationSession`]:
//! - `requestOffer`: create an offer, wait for candidate gathering, send it
//! - `offer`: apply it, create an answer, wait for gathering, send it
//! - `answer`: apply it
//! - `candidate`: ignored (descriptions already carry every candidate)
//!
//! Locally discovered candidates are relayed as `candidate` messages, and
//! every data stream the remote opens gets a timestamp heartbeat.

pub mod heartbeat;
pub mod peer;
pub mod relay;
pub mod rtc;
pub mod session;
pub mod types;

#[cfg(test)]
mod fake;

pub use peer::{DataStream, GatheringComplete, PeerConnection, PeerConnector};
pub use rtc::{RtcConnector, RtcConnectorBuilder};
pub use session::{NegotiationSession, Outbound, SessionConfig};
pub use types::{
    CandidateInit, ControlMessage, IceConnectionState, MessageKind, Role, RoleChange, SdpType,
    SessionDescription,
};
