mod connection_negotiator;
mod rtc_transport;
mod transport;

pub use connection_negotiator::*;
pub use rtc_transport::*;
pub use transport::*;
