pub use tandem_core::{ParticipantIdentity, PeerId, RoomId};

pub mod model {
    pub use tandem_core::model::*;
}

pub mod utils {
    pub use tandem_core::utils::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use tandem_session::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use tandem_relay::*;
}
