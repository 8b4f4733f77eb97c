use tandem_core::RoomId;

/// User intents, fed to the coordinator loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Join(RoomId),
    StartCall,
    ToggleCamera,
    ToggleMicrophone,
    ToggleScreenShare,
    SendMessage(String),
    LeaveCall,
}
