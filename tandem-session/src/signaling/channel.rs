use crate::error::SessionError;
use async_trait::async_trait;
use tandem_core::SignalMessage;
use tokio::sync::mpsc;

/// What the relay connection delivers to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Message(SignalMessage),
    /// The connection ended. Sent once, after every message that preceded it.
    Closed,
}

/// Outbound half of an ordered connection to the relay.
pub trait SignalingChannel: Send + Sync {
    /// Queues a message. Messages leave in the order they were queued.
    fn send(&self, message: SignalMessage) -> Result<(), SessionError>;

    /// Flushes queued messages, then closes. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

pub type SignalReceiver = mpsc::UnboundedReceiver<SignalEvent>;

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SignalingChannel>, SignalReceiver), SessionError>;
}
