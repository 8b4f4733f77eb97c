use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::{SessionCommand, SessionCoordinator, SessionEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// A coordinator running on its own task.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn spawn(
        coordinator: SessionCoordinator,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(coordinator.run(command_rx));
        Self {
            commands,
            events,
            task,
        }
    }

    /// Spawns a coordinator with the default relay, transport and devices.
    pub fn start(config: SessionConfig) -> Self {
        let (coordinator, events) = SessionCoordinator::with_defaults(config);
        Self::spawn(coordinator, events)
    }

    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::invalid_state("send-command", "finished"))
    }

    /// `None` once the session task has ended and every event was read.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Skips events until one matches.
    pub async fn wait_for<F>(&mut self, mut matches: F) -> Option<SessionEvent>
    where
        F: FnMut(&SessionEvent) -> bool,
    {
        while let Some(event) = self.events.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Closes the command channel and waits for teardown to complete.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!("Session task ended abnormally: {:?}", e);
        }
    }
}
