use std::time::Duration;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:5000/ws";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";

/// Number of participants a room can hold.
pub const ROOM_CAPACITY: usize = 2;

/// Pause between a remote `leave-call` and returning to the landing state,
/// long enough for the user to read the notice.
pub const LEAVE_GRACE_PERIOD: Duration = Duration::from_secs(3);
