use crate::error::SessionError;
use crate::signaling::channel::{SignalEvent, SignalReceiver, SignalingChannel, SignalingConnector};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::SignalMessage;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Outgoing {
    Signal(SignalMessage),
    Close,
}

/// Relay connection over a WebSocket, one JSON text frame per message.
pub struct WsChannel {
    tx: mpsc::UnboundedSender<Outgoing>,
    closed: AtomicBool,
}

impl WsChannel {
    pub async fn connect(url: &str) -> Result<(Self, SignalReceiver), SessionError> {
        info!("Connecting to signaling relay: {}", url);

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SessionError::Signaling(format!("Failed to connect to {}: {}", url, e)))?;

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::sender_task(write, rx));
        tokio::spawn(Self::receiver_task(read, event_tx));

        let channel = Self {
            tx,
            closed: AtomicBool::new(false),
        };
        Ok((channel, event_rx))
    }

    async fn sender_task(
        mut write: SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Outgoing>,
    ) {
        while let Some(outgoing) = rx.recv().await {
            let message = match outgoing {
                Outgoing::Signal(signal) => match serde_json::to_string(&signal) {
                    Ok(json) => Message::text(json),
                    Err(e) => {
                        error!("Failed to serialize {}: {:?}", signal.tag(), e);
                        continue;
                    }
                },
                Outgoing::Close => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = write.send(message).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }

        debug!("Signaling sender task terminated");
    }

    async fn receiver_task(
        mut read: SplitStream<WsStream>,
        event_tx: mpsc::UnboundedSender<SignalEvent>,
    ) {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<SignalMessage>(text.as_str()) {
                        Ok(signal) => {
                            if event_tx.send(SignalEvent::Message(signal)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Invalid signaling message: {:?}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Signaling connection closed by relay");
                    break;
                }
                Err(e) => {
                    warn!("Signaling connection error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        let _ = event_tx.send(SignalEvent::Closed);
        debug!("Signaling receiver task terminated");
    }
}

impl SignalingChannel for WsChannel {
    fn send(&self, message: SignalMessage) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Signaling(format!(
                "cannot send {}: channel closed",
                message.tag()
            )));
        }
        debug!("Sending {}", message.tag());
        self.tx
            .send(Outgoing::Signal(message))
            .map_err(|_| SessionError::ChannelClosedUnexpectedly)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Outgoing::Close);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens a [`WsChannel`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SignalingChannel>, SignalReceiver), SessionError> {
        let (channel, events) = WsChannel::connect(url).await?;
        Ok((Box::new(channel), events))
    }
}
