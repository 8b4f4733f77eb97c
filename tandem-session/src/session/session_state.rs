use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Joining,
    AwaitingPeer,
    InCall,
    /// Torn down after the other side left; waiting out the grace period.
    Leaving,
    Left,
}

impl SessionState {
    /// Joined and not yet torn down.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::AwaitingPeer | SessionState::InCall)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Joining => "joining",
            SessionState::AwaitingPeer => "awaiting-peer",
            SessionState::InCall => "in-call",
            SessionState::Leaving => "leaving",
            SessionState::Left => "left",
        };
        f.write_str(name)
    }
}
