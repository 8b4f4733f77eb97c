use crate::media::{MediaTrack, TrackKind};
use anyhow::Result;
use async_trait::async_trait;
use tandem_core::{IceCandidate, IceServerConfig, SessionDescription};
use tokio::sync::mpsc;

/// Connectivity state reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// Everything a transport reports from its own tasks. Drained by the
/// coordinator loop, never handled in the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    CandidateGenerated(IceCandidate),
    RemoteTrack(RemoteTrackInfo),
    StateChanged(TransportState),
}

/// A single peer connection.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attaches a local track. A sender parked by `remove_track` for the
    /// same kind is reused before a new one is created.
    async fn add_track(&self, track: &MediaTrack) -> Result<()>;

    /// Detaches a track. Its sender stays on the connection without a track.
    async fn remove_track(&self, track: &MediaTrack) -> Result<()>;

    /// Creates an offer and applies it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Applies a remote offer and returns the applied local answer.
    async fn accept_offer(&self, offer: &SessionDescription) -> Result<SessionDescription>;

    async fn accept_answer(&self, answer: &SessionDescription) -> Result<()>;

    /// Discards the applied local offer and returns to a stable state.
    async fn rollback(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>>;
}
