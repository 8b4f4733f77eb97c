use crate::error::RelayError;
use crate::room::RoomRegistry;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{PeerId, RoomId, SignalMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct RelayInner {
    peers: DashMap<PeerId, mpsc::UnboundedSender<SignalMessage>>,
    rooms: RoomRegistry,
}

/// Routes signal messages between the two seats of each room.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self::with_registry(RoomRegistry::new())
    }

    pub fn with_registry(rooms: RoomRegistry) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                peers: DashMap::new(),
                rooms,
            }),
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.inner.rooms
    }

    pub fn add_peer(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<SignalMessage>) {
        self.inner.peers.insert(peer_id, tx);
    }

    /// Drops the connection and frees its seat. The other participant is not
    /// told; departure is only announced by the participant itself.
    pub fn remove_peer(&self, peer_id: &PeerId) {
        self.inner.peers.remove(peer_id);
        if let Some(room_id) = self.inner.rooms.leave(peer_id) {
            info!("Peer {:?} left room '{}'", peer_id, room_id);
        }
    }

    pub fn handle_text(&self, from: PeerId, text: &str) -> Result<(), RelayError> {
        let msg = serde_json::from_str::<SignalMessage>(text)?;
        self.handle_signal(from, msg)
    }

    pub fn handle_signal(&self, from: PeerId, msg: SignalMessage) -> Result<(), RelayError> {
        debug!("Signal '{}' from {:?}", msg.tag(), from);

        match msg {
            SignalMessage::JoinRoom { room_id, identity } => {
                info!(
                    "Peer {:?} ({}) wants to join room '{}'",
                    from,
                    identity.map(|i| i.name).unwrap_or_else(|| "anonymous".to_owned()),
                    room_id
                );
                if let Err(e) = self.inner.rooms.join(&room_id, from) {
                    warn!("Rejecting {:?}: {}", from, e);
                    self.send_signal(from, SignalMessage::RoomBusy);
                    return Err(e);
                }
                Ok(())
            }

            SignalMessage::RoomBusy => Err(RelayError::UnexpectedMessage("room-busy")),
            SignalMessage::ReceiveMessage { .. } => {
                Err(RelayError::UnexpectedMessage("receive-message"))
            }

            SignalMessage::SendMessage { room_id, message } => {
                self.check_seat(from, &room_id)?;
                self.forward(from, SignalMessage::ReceiveMessage { room_id, message });
                Ok(())
            }

            other => {
                if let Some(room_id) = other.room_id() {
                    self.check_seat(from, room_id)?;
                }
                self.forward(from, other);
                Ok(())
            }
        }
    }

    pub fn send_signal(&self, peer_id: PeerId, msg: SignalMessage) {
        if let Some(peer) = self.inner.peers.get(&peer_id) {
            if let Err(e) = peer.send(msg) {
                warn!("Failed to queue signal for {:?}: {:?}", peer_id, e.0.tag());
            }
        } else {
            warn!(
                "Attempted to send signal to disconnected peer {:?}",
                peer_id
            );
        }
    }

    fn check_seat(&self, from: PeerId, room_id: &RoomId) -> Result<(), RelayError> {
        let expected = self
            .inner
            .rooms
            .room_of(&from)
            .ok_or(RelayError::NotJoined(from))?;

        if &expected != room_id {
            return Err(RelayError::RoomMismatch {
                expected,
                got: room_id.clone(),
            });
        }
        Ok(())
    }

    fn forward(&self, from: PeerId, msg: SignalMessage) {
        match self.inner.rooms.other_participant(&from) {
            Some(to) => self.send_signal(to, msg),
            None => debug!("No one else in the room of {:?}, '{}' dropped", from, msg.tag()),
        }
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}
