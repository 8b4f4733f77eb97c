use crate::model::chat::ChatMessage;
use crate::model::participant::ParticipantIdentity;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// An SDP blob together with its role, shaped like the browser's
/// `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Connectivity candidate in `RTCIceCandidateInit` JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Everything exchanged with the relay. One JSON text frame per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    JoinRoom {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        identity: Option<ParticipantIdentity>,
    },
    RoomBusy,
    Offer {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        offer: SessionDescription,
    },
    Answer {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        candidate: IceCandidate,
    },
    LeaveCall {
        #[serde(rename = "roomID")]
        room_id: RoomId,
    },
    ScreenShareStarted {
        #[serde(rename = "roomID")]
        room_id: RoomId,
    },
    ScreenShareStopped {
        #[serde(rename = "roomID")]
        room_id: RoomId,
    },
    SendMessage {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        message: ChatMessage,
    },
    ReceiveMessage {
        #[serde(rename = "roomID")]
        room_id: RoomId,
        message: ChatMessage,
    },
}

impl SignalMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            SignalMessage::JoinRoom { .. } => "join-room",
            SignalMessage::RoomBusy => "room-busy",
            SignalMessage::Offer { .. } => "offer",
            SignalMessage::Answer { .. } => "answer",
            SignalMessage::IceCandidate { .. } => "ice-candidate",
            SignalMessage::LeaveCall { .. } => "leave-call",
            SignalMessage::ScreenShareStarted { .. } => "screen-share-started",
            SignalMessage::ScreenShareStopped { .. } => "screen-share-stopped",
            SignalMessage::SendMessage { .. } => "send-message",
            SignalMessage::ReceiveMessage { .. } => "receive-message",
        }
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            SignalMessage::RoomBusy => None,
            SignalMessage::JoinRoom { room_id, .. }
            | SignalMessage::Offer { room_id, .. }
            | SignalMessage::Answer { room_id, .. }
            | SignalMessage::IceCandidate { room_id, .. }
            | SignalMessage::LeaveCall { room_id }
            | SignalMessage::ScreenShareStarted { room_id }
            | SignalMessage::ScreenShareStopped { room_id }
            | SignalMessage::SendMessage { room_id, .. }
            | SignalMessage::ReceiveMessage { room_id, .. } => Some(room_id),
        }
    }
}
