//! Control-channel wire types and negotiation state shared by the session

use serde::{Deserialize, Deserializer, Serialize};

/// Event tags understood on the control channel
pub const EVENT_REQUEST_OFFER: &str = "requestOffer";
pub const EVENT_OFFER: &str = "offer";
pub const EVENT_ANSWER: &str = "answer";
pub const EVENT_CANDIDATE: &str = "candidate";

/// Generate a short random id used to tag one control-channel session in logs
pub fn generate_session_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| {
            let digit = rng.gen_range(0..36u32);
            char::from_digit(digit, 36).unwrap_or('0')
        })
        .collect()
}

/// One unit on the control channel: `{"event": "...", "data": "..."}`
///
/// `data` is opaque and interpreted according to `event`. Unknown events are
/// kept as-is so newer peers can talk to this server without breaking it.
/// Missing or `null` fields read as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub event: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ControlMessage {
    pub fn new(event: &str, data: String) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    pub fn request_offer() -> Self {
        Self::new(EVENT_REQUEST_OFFER, String::new())
    }

    pub fn offer(description: &SessionDescription) -> serde_json::Result<Self> {
        Ok(Self::new(EVENT_OFFER, serde_json::to_string(description)?))
    }

    pub fn answer(description: &SessionDescription) -> serde_json::Result<Self> {
        Ok(Self::new(EVENT_ANSWER, serde_json::to_string(description)?))
    }

    pub fn candidate(candidate: &CandidateInit) -> serde_json::Result<Self> {
        Ok(Self::new(EVENT_CANDIDATE, serde_json::to_string(candidate)?))
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_event(&self.event)
    }
}

/// Dispatch tag derived from `ControlMessage::event`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    RequestOffer,
    Offer,
    Answer,
    Candidate,
    Unknown(String),
}

impl MessageKind {
    pub fn from_event(event: &str) -> Self {
        match event {
            EVENT_REQUEST_OFFER => MessageKind::RequestOffer,
            EVENT_OFFER => MessageKind::Offer,
            EVENT_ANSWER => MessageKind::Answer,
            EVENT_CANDIDATE => MessageKind::Candidate,
            other => MessageKind::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::RequestOffer => write!(f, "{}", EVENT_REQUEST_OFFER),
            MessageKind::Offer => write!(f, "{}", EVENT_OFFER),
            MessageKind::Answer => write!(f, "{}", EVENT_ANSWER),
            MessageKind::Candidate => write!(f, "{}", EVENT_CANDIDATE),
            MessageKind::Unknown(event) => write!(f, "{}", event),
        }
    }
}

/// SDP message type, serialized the way browsers do (`"offer"`, `"answer"`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl std::fmt::Display for SdpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Pranswer => write!(f, "pranswer"),
            SdpType::Answer => write!(f, "answer"),
            SdpType::Rollback => write!(f, "rollback"),
        }
    }
}

/// Session description in `RTCSessionDescriptionInit` JSON form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Connectivity candidate in `RTCIceCandidateInit` JSON form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateInit {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment", default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// ICE connection state as reported by the peer-connection engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
    Unspecified,
}

impl std::fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IceConnectionState::New => write!(f, "new"),
            IceConnectionState::Checking => write!(f, "checking"),
            IceConnectionState::Connected => write!(f, "connected"),
            IceConnectionState::Completed => write!(f, "completed"),
            IceConnectionState::Disconnected => write!(f, "disconnected"),
            IceConnectionState::Failed => write!(f, "failed"),
            IceConnectionState::Closed => write!(f, "closed"),
            IceConnectionState::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Which side of the negotiation this server plays on one session.
///
/// Assigned by the first `requestOffer` (offerer) or `offer` (answerer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unstarted,
    Offerer,
    Answerer,
}

/// Outcome of assigning a role on dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    /// First negotiation on this session
    Initial,
    /// Same role negotiated again (re-negotiation)
    Repeat,
    /// The remote flipped roles on an already-negotiated session
    Switch { from: Role },
}

impl Role {
    pub fn assign(&mut self, next: Role) -> RoleChange {
        let previous = std::mem::replace(self, next);
        match previous {
            Role::Unstarted => RoleChange::Initial,
            prev if prev == next => RoleChange::Repeat,
            from => RoleChange::Switch { from },
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Unstarted => write!(f, "unstarted"),
            Role::Offerer => write!(f, "offerer"),
            Role::Answerer => write!(f, "answerer"),
        }
    }
}
