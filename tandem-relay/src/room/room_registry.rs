use crate::error::RelayError;
use crate::room::Room;
use dashmap::DashMap;
use tandem_core::utils::ROOM_CAPACITY;
use tandem_core::{PeerId, RoomId};
use tracing::{debug, info};

/// Which connection sits in which room.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Room>,
    seats: DashMap<PeerId, RoomId>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_capacity(ROOM_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            seats: DashMap::new(),
            capacity,
        }
    }

    pub fn join(&self, room_id: &RoomId, peer_id: PeerId) -> Result<(), RelayError> {
        if let Some(current) = self.room_of(&peer_id) {
            if &current == room_id {
                return Ok(());
            }
            self.leave(&peer_id);
        }

        let mut room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(self.capacity));

        if !room.seat(peer_id) {
            return Err(RelayError::RoomBusy(room_id.clone()));
        }
        self.seats.insert(peer_id, room_id.clone());

        info!(
            "Peer {:?} seated in room '{}' ({}/{})",
            peer_id,
            room_id,
            room.len(),
            self.capacity
        );
        Ok(())
    }

    /// Frees the seat held by `peer_id`, dropping the room once it is empty.
    pub fn leave(&self, peer_id: &PeerId) -> Option<RoomId> {
        let (_, room_id) = self.seats.remove(peer_id)?;

        let now_empty = match self.rooms.get_mut(&room_id) {
            Some(mut room) => {
                room.vacate(peer_id);
                room.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.rooms.remove_if(&room_id, |_, room| room.is_empty());
            debug!("Room '{}' is empty, removed", room_id);
        }

        Some(room_id)
    }

    pub fn room_of(&self, peer_id: &PeerId) -> Option<RoomId> {
        self.seats.get(peer_id).map(|entry| entry.value().clone())
    }

    pub fn other_participant(&self, peer_id: &PeerId) -> Option<PeerId> {
        let room_id = self.room_of(peer_id)?;
        let room = self.rooms.get(&room_id)?;
        room.others(peer_id).next().copied()
    }

    pub fn occupancy(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map(|room| room.len()).unwrap_or(0)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
