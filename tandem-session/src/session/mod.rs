mod coordinator;
mod handle;
mod session_command;
mod session_event;
mod session_state;

pub use coordinator::{SessionCoordinator, SessionInput};
pub use handle::SessionHandle;
pub use session_command::SessionCommand;
pub use session_event::SessionEvent;
pub use session_state::SessionState;
