use tandem_core::{PeerId, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("room {0} already has two participants")]
    RoomBusy(RoomId),

    #[error("connection {0} has not joined a room")]
    NotJoined(PeerId),

    #[error("message addressed to room {got} but connection is seated in {expected}")]
    RoomMismatch { expected: RoomId, got: RoomId },

    #[error("'{0}' is never sent by participants")]
    UnexpectedMessage(&'static str),

    #[error("invalid signal message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}
