//! Reference signaling relay: seats at most two connections per room and
//! forwards negotiation, departure, screen-share and chat messages to the
//! other seat.

mod config;
mod error;
mod room;
mod signaling;

pub use config::*;
pub use error::*;
pub use room::*;
pub use signaling::*;
