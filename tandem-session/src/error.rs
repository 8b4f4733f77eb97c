use thiserror::Error;

/// Failures surfaced by a session. Carried inside [`crate::SessionEvent::Notice`],
/// so every variant is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("camera or microphone access denied: {0}")]
    MediaAccessDenied(String),

    #[error("screen capture denied: {0}")]
    ScreenCaptureDenied(String),

    #[error("invalid ICE candidate: {0}")]
    InvalidIceCandidate(String),

    #[error("room is busy")]
    RoomBusy,

    #[error("the other participant left the call")]
    PeerDeparted,

    #[error("signaling channel closed unexpectedly")]
    ChannelClosedUnexpectedly,

    #[error("'{operation}' is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("signaling error: {0}")]
    Signaling(String),
}

impl SessionError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    pub(crate) fn negotiation(err: anyhow::Error) -> Self {
        Self::Negotiation(format!("{:#}", err))
    }

    /// Whether the error ends the session rather than a single operation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RoomBusy | Self::PeerDeparted | Self::ChannelClosedUnexpectedly
        )
    }
}
