use crate::error::SessionError;
use crate::media::TrackKind;
use crate::negotiator::PeerConnectionState;
use crate::session::SessionState;
use tandem_core::ChatMessage;

/// Notifications for whatever renders the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    LocalMediaReady { tracks: usize },
    LocalTrackToggled { kind: TrackKind, enabled: bool },
    LocalScreenShare { active: bool },
    /// The remote track set changed; `tracks` is the new total.
    RemoteStreamArrived { tracks: usize },
    RemoteScreenShare { active: bool },
    ConnectionStateChanged(PeerConnectionState),
    ChatMessage(ChatMessage),
    Notice(SessionError),
    /// Return to the landing view.
    Redirect,
}
