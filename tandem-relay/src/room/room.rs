use tandem_core::PeerId;

/// Seats of one room, in join order.
#[derive(Debug)]
pub struct Room {
    participants: Vec<PeerId>,
    capacity: usize,
}

impl Room {
    pub fn new(capacity: usize) -> Self {
        Self {
            participants: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns false when every seat is taken.
    pub fn seat(&mut self, peer_id: PeerId) -> bool {
        if self.participants.contains(&peer_id) {
            return true;
        }
        if self.is_full() {
            return false;
        }
        self.participants.push(peer_id);
        true
    }

    pub fn vacate(&mut self, peer_id: &PeerId) {
        self.participants.retain(|p| p != peer_id);
    }

    pub fn others(&self, peer_id: &PeerId) -> impl Iterator<Item = &PeerId> {
        self.participants.iter().filter(move |p| *p != peer_id)
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }
}
