//! Session lifecycle for a two-party call: joins a room through the signaling
//! relay, negotiates a peer connection, renegotiates for screen share, carries
//! chat over the signaling channel and tears everything down in a fixed order.

mod chat;
mod config;
mod error;
pub mod media;
pub mod negotiator;
pub mod session;
pub mod signaling;

pub use chat::ChatLog;
pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use session::{
    SessionCommand, SessionCoordinator, SessionEvent, SessionHandle, SessionInput, SessionState,
};
