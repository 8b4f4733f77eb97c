mod chat;
mod participant;
mod peer;
mod room;
mod signaling;

pub use chat::ChatMessage;
pub use participant::ParticipantIdentity;
pub use peer::PeerId;
pub use room::{InvalidRoomId, RoomId};
pub use signaling::{IceCandidate, IceServerConfig, SdpKind, SessionDescription, SignalMessage};
