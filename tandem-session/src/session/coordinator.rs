use crate::chat::ChatLog;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::media::{
    MediaDevices, MediaSourceManager, MediaStream, MediaTrack, StreamKind, SyntheticDevices,
    TrackKind,
};
use crate::negotiator::{
    ConnectionNegotiator, PeerConnectionState, RtcTransportFactory, TransportEvent,
    TransportFactory,
};
use crate::session::{SessionCommand, SessionEvent, SessionState};
use crate::signaling::{
    SignalEvent, SignalReceiver, SignalingChannel, SignalingConnector, WsConnector,
};
use std::future::pending;
use std::sync::Arc;
use tandem_core::{ChatMessage, IceCandidate, RoomId, SessionDescription, SignalMessage};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

/// Anything the coordinator reacts to besides user commands.
#[derive(Debug)]
pub enum SessionInput {
    Signal(SignalEvent),
    Transport(TransportEvent),
    RedirectDue,
}

/// Session lifecycle of one participant. Owns every resource of the
/// session and is driven one event at a time, either through [`run`]
/// or by calling the command methods and [`dispatch`] directly.
///
/// [`run`]: SessionCoordinator::run
/// [`dispatch`]: SessionCoordinator::dispatch
pub struct SessionCoordinator {
    config: SessionConfig,
    state: SessionState,
    room_id: Option<RoomId>,
    media: MediaSourceManager,
    negotiator: ConnectionNegotiator,
    transports: Arc<dyn TransportFactory>,
    connector: Arc<dyn SignalingConnector>,
    signaling: Option<Box<dyn SignalingChannel>>,
    signal_rx: Option<SignalReceiver>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    remote_stream: Option<MediaStream>,
    remote_screen_active: bool,
    peer_state: PeerConnectionState,
    chat: ChatLog,
    events: mpsc::UnboundedSender<SessionEvent>,
    redirect_at: Option<Instant>,
}

impl SessionCoordinator {
    pub fn new(
        config: SessionConfig,
        devices: Arc<dyn MediaDevices>,
        transports: Arc<dyn TransportFactory>,
        connector: Arc<dyn SignalingConnector>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (events, events_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            config,
            state: SessionState::Idle,
            room_id: None,
            media: MediaSourceManager::new(devices),
            negotiator: ConnectionNegotiator::new(),
            transports,
            connector,
            signaling: None,
            signal_rx: None,
            transport_tx,
            transport_rx,
            remote_stream: None,
            remote_screen_active: false,
            peer_state: PeerConnectionState::New,
            chat: ChatLog::new(),
            events,
            redirect_at: None,
        };
        (coordinator, events_rx)
    }

    /// WebSocket relay, webrtc transport and synthetic capture devices.
    pub fn with_defaults(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        Self::new(
            config,
            Arc::new(SyntheticDevices::new()),
            Arc::new(RtcTransportFactory),
            Arc::new(WsConnector),
        )
    }

    /// Drives the session until it reaches `Left` or `commands` closes.
    /// Resources are released on every exit path.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("Session event loop started");

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down session.");
                            break;
                        }
                    }
                }

                input = self.next_input() => self.dispatch(input).await,
            }

            if self.state == SessionState::Left {
                break;
            }
        }

        self.cleanup().await;
        info!("Session event loop finished");
    }

    /// Runs a command and reports its failure as a notice.
    pub async fn handle_command(&mut self, cmd: SessionCommand) {
        debug!("Processing {:?} in state {}", cmd, self.state);

        let result = match cmd {
            SessionCommand::Join(room_id) => self.join(room_id).await,
            SessionCommand::StartCall => self.start_call().await,
            SessionCommand::ToggleCamera => self.toggle_track(TrackKind::Video),
            SessionCommand::ToggleMicrophone => self.toggle_track(TrackKind::Audio),
            SessionCommand::ToggleScreenShare => self.toggle_screen_share().await,
            SessionCommand::SendMessage(content) => self.send_chat(&content),
            SessionCommand::LeaveCall => self.leave_call().await,
        };

        if let Err(e) = result {
            warn!("Command failed: {}", e);
            self.emit(SessionEvent::Notice(e));
        }
    }

    /// Waits for the next signaling message, transport event or redirect
    /// deadline. Cancel-safe.
    pub async fn next_input(&mut self) -> SessionInput {
        let redirect_at = self.redirect_at;

        tokio::select! {
            event = recv_signal(&mut self.signal_rx) => SessionInput::Signal(event),
            Some(event) = self.transport_rx.recv() => SessionInput::Transport(event),
            _ = redirect_due(redirect_at) => SessionInput::RedirectDue,
        }
    }

    pub async fn dispatch(&mut self, input: SessionInput) {
        let result = match input {
            SessionInput::Signal(SignalEvent::Message(message)) => {
                self.handle_signal(message).await
            }
            SessionInput::Signal(SignalEvent::Closed) => self.on_channel_closed().await,
            SessionInput::Transport(event) => self.handle_transport_event(event),
            SessionInput::RedirectDue => {
                self.finish_leaving();
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Failed to handle input: {}", e);
            self.emit(SessionEvent::Notice(e));
        }
    }

    // ---- commands ----

    /// Opens the relay connection and acquires camera+microphone at the same
    /// time. On any failure everything acquired so far is released and the
    /// session returns to `Idle`.
    pub async fn join(&mut self, room_id: RoomId) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::invalid_state("join", self.state));
        }

        info!("Joining room {:?}", room_id.as_str());
        self.room_id = Some(room_id.clone());
        self.set_state(SessionState::Joining);

        let connector = self.connector.clone();
        let url = self.config.relay_url.clone();
        let join = SignalMessage::JoinRoom {
            room_id,
            identity: Some(self.config.identity.clone()),
        };

        let (connected, local) = tokio::join!(
            async move {
                let (channel, events) = connector.connect(&url).await?;
                let sent = channel.send(join);
                Ok::<_, SessionError>(((channel, events), sent))
            },
            self.media.acquire_local_media(),
        );

        let signaling_err = match connected {
            Ok(((channel, events), sent)) => {
                self.signaling = Some(channel);
                self.signal_rx = Some(events);
                sent.err()
            }
            Err(e) => Some(e),
        };

        let local = match (local, signaling_err) {
            (Err(e), _) | (Ok(_), Some(e)) => return self.abort_join(e).await,
            (Ok(local), None) => local,
        };

        let transport = match self
            .transports
            .create(&self.config.ice_servers, self.transport_tx.clone())
            .await
        {
            Ok(transport) => transport,
            Err(e) => return self.abort_join(SessionError::negotiation(e)).await,
        };
        if let Err(e) = self.negotiator.initialize(transport, &local).await {
            return self.abort_join(e).await;
        }

        self.emit(SessionEvent::LocalMediaReady {
            tracks: local.tracks().len(),
        });
        self.set_state(SessionState::AwaitingPeer);
        Ok(())
    }

    async fn abort_join(&mut self, err: SessionError) -> Result<(), SessionError> {
        warn!("Join failed: {}", err);
        self.cleanup().await;
        self.room_id = None;
        self.set_state(SessionState::Idle);
        Err(err)
    }

    /// Sends an offer to the other participant. Does nothing once remote
    /// media is flowing; re-sends the outstanding offer if a round is open.
    pub async fn start_call(&mut self) -> Result<(), SessionError> {
        self.require_active("start-call")?;

        if self.remote_stream.is_some() {
            debug!("Remote media already present, not starting a call");
            return Ok(());
        }

        if let Some(offer) = self.negotiator.pending_offer().cloned() {
            debug!("Offer already in flight, sending it again");
            let room_id = self.current_room()?;
            return self.send(SignalMessage::Offer { room_id, offer });
        }

        self.send_offer().await
    }

    fn toggle_track(&mut self, kind: TrackKind) -> Result<(), SessionError> {
        let operation = match kind {
            TrackKind::Video => "toggle-camera",
            TrackKind::Audio => "toggle-microphone",
        };
        let enabled = self
            .media
            .toggle_track(kind)
            .ok_or_else(|| SessionError::invalid_state(operation, self.state))?;

        self.emit(SessionEvent::LocalTrackToggled { kind, enabled });
        Ok(())
    }

    pub fn toggle_camera(&mut self) -> Result<(), SessionError> {
        self.toggle_track(TrackKind::Video)
    }

    pub fn toggle_microphone(&mut self) -> Result<(), SessionError> {
        self.toggle_track(TrackKind::Audio)
    }

    /// Starts or stops sharing the screen. Starting attaches the screen track
    /// and runs one renegotiation round; stopping detaches it and ends the
    /// capture. A restarted share reuses the detached sender.
    pub async fn toggle_screen_share(&mut self) -> Result<(), SessionError> {
        self.require_active("toggle-screen-share")?;
        let room_id = self.current_room()?;

        if self.media.is_sharing_screen() {
            self.drop_screen_share().await;
            self.emit(SessionEvent::LocalScreenShare { active: false });
            return self.send(SignalMessage::ScreenShareStopped { room_id });
        }

        let screen = self.media.acquire_screen_capture().await?;
        if let Err(e) = self.negotiator.add_track(&screen).await {
            self.drop_screen_share().await;
            return Err(e);
        }

        if self.negotiator.has_pending_offer() {
            debug!("Offer in flight, screen share renegotiation deferred");
        } else if let Err(e) = self.send_offer().await {
            self.drop_screen_share().await;
            return Err(e);
        }

        self.emit(SessionEvent::LocalScreenShare { active: true });
        self.send(SignalMessage::ScreenShareStarted { room_id })
    }

    async fn drop_screen_share(&mut self) {
        if let Some(screen) = self.media.screen()
            && let Err(e) = self.negotiator.remove_track(screen).await
        {
            warn!("Failed to detach screen share: {}", e);
        }
        self.media.release(StreamKind::Screen);
    }

    /// Blank content is ignored. Otherwise the message is logged locally
    /// before it is sent.
    pub fn send_chat(&mut self, content: &str) -> Result<(), SessionError> {
        self.require_active("send-message")?;
        let room_id = self.current_room()?;

        let Some(message) = self.chat.compose(&self.config.identity, content) else {
            return Ok(());
        };
        self.emit(SessionEvent::ChatMessage(message.clone()));
        self.send(SignalMessage::SendMessage { room_id, message })
    }

    /// Tells the other side first, then tears down.
    pub async fn leave_call(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::AwaitingPeer | SessionState::InCall => {}
            SessionState::Leaving => {
                self.finish_leaving();
                return Ok(());
            }
            state => return Err(SessionError::invalid_state("leave-call", state)),
        }

        let room_id = self.current_room()?;
        if let Err(e) = self.send(SignalMessage::LeaveCall { room_id }) {
            warn!("Could not notify peer about leaving: {}", e);
        }

        self.cleanup().await;
        self.set_state(SessionState::Left);
        self.emit(SessionEvent::Redirect);
        Ok(())
    }

    /// Releases everything the session holds, in order: camera, remote,
    /// screen, peer connection, signaling. Safe to call any number of times.
    pub async fn cleanup(&mut self) {
        self.media.release(StreamKind::Camera);
        if let Some(remote) = self.remote_stream.take() {
            remote.stop();
        }
        self.media.release(StreamKind::Screen);
        self.negotiator.close().await;
        if let Some(channel) = self.signaling.take() {
            channel.close();
        }
        self.signal_rx = None;
        self.remote_screen_active = false;
        self.chat.clear();
        self.sync_peer_state();
    }

    // ---- inbound signaling ----

    async fn handle_signal(&mut self, message: SignalMessage) -> Result<(), SessionError> {
        if let Some(room_id) = message.room_id()
            && Some(room_id) != self.room_id.as_ref()
        {
            warn!("Ignoring {} for foreign room {:?}", message.tag(), room_id.as_str());
            return Ok(());
        }
        debug!("Received {} in state {}", message.tag(), self.state);

        match message {
            SignalMessage::RoomBusy => self.on_room_busy().await,
            SignalMessage::Offer { offer, .. } => self.on_offer(offer).await,
            SignalMessage::Answer { answer, .. } => self.on_answer(answer).await,
            SignalMessage::IceCandidate { candidate, .. } => self.on_ice_candidate(candidate).await,
            SignalMessage::LeaveCall { .. } => self.on_peer_left().await,
            SignalMessage::ScreenShareStarted { .. } => self.on_remote_screen_share(true),
            SignalMessage::ScreenShareStopped { .. } => self.on_remote_screen_share(false),
            SignalMessage::ReceiveMessage { message, .. } => self.on_chat_message(message),
            other @ (SignalMessage::JoinRoom { .. } | SignalMessage::SendMessage { .. }) => {
                warn!("Relay delivered client-only message {}", other.tag());
                Ok(())
            }
        }
    }

    async fn on_room_busy(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Left {
            return Ok(());
        }
        info!("Room is busy");
        self.emit(SessionEvent::Notice(SessionError::RoomBusy));
        self.cleanup().await;
        self.redirect_at = None;
        self.set_state(SessionState::Left);
        self.emit(SessionEvent::Redirect);
        Ok(())
    }

    async fn on_offer(&mut self, offer: SessionDescription) -> Result<(), SessionError> {
        self.require_active("offer")?;
        let room_id = self.current_room()?;

        let Some(answer) = self.negotiator.handle_remote_offer(&offer).await? else {
            debug!("Colliding offer ignored, waiting for the answer to ours");
            return Ok(());
        };
        self.send(SignalMessage::Answer { room_id, answer })?;
        self.set_state(SessionState::InCall);
        self.sync_peer_state();
        self.flush_renegotiation().await
    }

    async fn on_answer(&mut self, answer: SessionDescription) -> Result<(), SessionError> {
        self.require_active("answer")?;

        self.negotiator.handle_remote_answer(&answer).await?;
        self.set_state(SessionState::InCall);
        self.sync_peer_state();
        self.flush_renegotiation().await
    }

    async fn on_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), SessionError> {
        self.negotiator.add_remote_ice_candidate(&candidate).await;
        Ok(())
    }

    async fn on_peer_left(&mut self) -> Result<(), SessionError> {
        if !self.state.is_active() {
            debug!("Ignoring leave-call in state {}", self.state);
            return Ok(());
        }
        info!("Other participant left the call");
        self.emit(SessionEvent::Notice(SessionError::PeerDeparted));
        self.end_with_grace().await;
        Ok(())
    }

    async fn on_channel_closed(&mut self) -> Result<(), SessionError> {
        self.signal_rx = None;
        if !self.state.is_active() {
            debug!("Signaling closed in state {}", self.state);
            return Ok(());
        }
        warn!("Signaling channel closed unexpectedly");
        self.emit(SessionEvent::Notice(SessionError::ChannelClosedUnexpectedly));
        self.end_with_grace().await;
        Ok(())
    }

    fn on_remote_screen_share(&mut self, active: bool) -> Result<(), SessionError> {
        self.remote_screen_active = active;
        self.emit(SessionEvent::RemoteScreenShare { active });
        Ok(())
    }

    fn on_chat_message(&mut self, message: ChatMessage) -> Result<(), SessionError> {
        self.chat.append(message.clone());
        self.emit(SessionEvent::ChatMessage(message));
        Ok(())
    }

    // ---- transport ----

    fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), SessionError> {
        if !self.negotiator.is_active() {
            debug!("Discarding transport event after teardown: {:?}", event);
            return Ok(());
        }

        match event {
            TransportEvent::CandidateGenerated(candidate) => {
                let room_id = self.current_room()?;
                self.send(SignalMessage::IceCandidate { room_id, candidate })
            }
            TransportEvent::RemoteTrack(info) => {
                let remote = self
                    .remote_stream
                    .get_or_insert_with(|| MediaStream::new(info.stream_id.clone(), Vec::new()));
                let track = Arc::new(MediaTrack::remote(info.kind, info.id));
                if remote.add_track(track) {
                    let tracks = remote.tracks().len();
                    self.emit(SessionEvent::RemoteStreamArrived { tracks });
                }
                Ok(())
            }
            TransportEvent::StateChanged(state) => {
                self.negotiator.on_transport_state(state);
                self.sync_peer_state();
                Ok(())
            }
        }
    }

    // ---- helpers ----

    async fn send_offer(&mut self) -> Result<(), SessionError> {
        let room_id = self.current_room()?;
        let offer = self.negotiator.create_offer().await?;
        self.sync_peer_state();
        self.send(SignalMessage::Offer { room_id, offer })
    }

    /// Issues the offer a screen share had to postpone.
    async fn flush_renegotiation(&mut self) -> Result<(), SessionError> {
        if self.negotiator.renegotiation_needed() && !self.negotiator.has_pending_offer() {
            debug!("Sending deferred renegotiation offer");
            return self.send_offer().await;
        }
        Ok(())
    }

    async fn end_with_grace(&mut self) {
        self.cleanup().await;
        self.set_state(SessionState::Leaving);
        self.redirect_at = Some(Instant::now() + self.config.leave_grace_period);
    }

    fn finish_leaving(&mut self) {
        self.redirect_at = None;
        self.set_state(SessionState::Left);
        self.emit(SessionEvent::Redirect);
    }

    fn send(&self, message: SignalMessage) -> Result<(), SessionError> {
        match &self.signaling {
            Some(channel) => channel.send(message),
            None => Err(SessionError::Signaling(format!(
                "cannot send {}: not connected",
                message.tag()
            ))),
        }
    }

    fn require_active(&self, operation: &'static str) -> Result<(), SessionError> {
        if !self.state.is_active() {
            return Err(SessionError::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn current_room(&self) -> Result<RoomId, SessionError> {
        self.room_id
            .clone()
            .ok_or_else(|| SessionError::invalid_state("use-room", self.state))
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        info!("Session state {} -> {}", self.state, state);
        self.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    fn sync_peer_state(&mut self) {
        let state = self.negotiator.peer_state();
        if self.peer_state == state {
            return;
        }
        self.peer_state = state;
        self.emit(SessionEvent::ConnectionStateChanged(state));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    // ---- accessors ----

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn peer_state(&self) -> PeerConnectionState {
        self.peer_state
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn local_stream(&self) -> Option<&MediaStream> {
        self.media.camera()
    }

    pub fn screen_stream(&self) -> Option<&MediaStream> {
        self.media.screen()
    }

    pub fn remote_stream(&self) -> Option<&MediaStream> {
        self.remote_stream.as_ref()
    }

    pub fn remote_screen_active(&self) -> bool {
        self.remote_screen_active
    }

    pub fn chat_log(&self) -> &ChatLog {
        &self.chat
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.media.release(StreamKind::Camera);
        if let Some(remote) = self.remote_stream.take() {
            remote.stop();
        }
        self.media.release(StreamKind::Screen);
        if let Some(channel) = self.signaling.take() {
            channel.close();
        }
        if !self.negotiator.is_active() {
            return;
        }

        let mut negotiator = std::mem::take(&mut self.negotiator);
        match Handle::try_current() {
            Ok(handle) => {
                debug!("Session dropped with an open peer connection, closing it");
                handle.spawn(async move { negotiator.close().await });
            }
            Err(_) => warn!("Session dropped outside a runtime with an open peer connection"),
        }
    }
}

async fn recv_signal(rx: &mut Option<SignalReceiver>) -> SignalEvent {
    match rx {
        Some(rx) => match rx.recv().await {
            Some(event) => event,
            None => pending().await,
        },
        None => pending().await,
    }
}

async fn redirect_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
