use crate::error::SessionError;
use crate::media::{MediaStream, MediaTrack};
use crate::negotiator::transport::{PeerTransport, TransportState};
use std::collections::HashSet;
use std::fmt;
use tandem_core::{IceCandidate, SessionDescription};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiatorState {
    Uninitialized,
    /// Connection exists, no round in flight, never completed one.
    Idle,
    OffererPending,
    AnswererPending,
    Connected,
    Closed,
}

impl fmt::Display for NegotiatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiatorState::Uninitialized => "uninitialized",
            NegotiatorState::Idle => "idle",
            NegotiatorState::OffererPending => "offerer-pending",
            NegotiatorState::AnswererPending => "answerer-pending",
            NegotiatorState::Connected => "connected",
            NegotiatorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the UI sees of the peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Negotiating,
    Connected,
    Closed,
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerConnectionState::New => "new",
            PeerConnectionState::Negotiating => "negotiating",
            PeerConnectionState::Connected => "connected",
            PeerConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the peer transport and runs offer/answer rounds on it, one at a time.
pub struct ConnectionNegotiator {
    state: NegotiatorState,
    transport: Option<Box<dyn PeerTransport>>,
    attached: HashSet<String>,
    pending_offer: Option<SessionDescription>,
    /// State to return to if the local offer is rolled back.
    offer_base: NegotiatorState,
    transport_connected: bool,
    renegotiation_needed: bool,
}

impl Default for ConnectionNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionNegotiator {
    pub fn new() -> Self {
        Self {
            state: NegotiatorState::Uninitialized,
            transport: None,
            attached: HashSet::new(),
            pending_offer: None,
            offer_base: NegotiatorState::Idle,
            transport_connected: false,
            renegotiation_needed: false,
        }
    }

    /// Takes ownership of a fresh transport and attaches every track of
    /// `local`. On failure the transport is closed and the negotiator stays
    /// uninitialized.
    pub async fn initialize(
        &mut self,
        transport: Box<dyn PeerTransport>,
        local: &MediaStream,
    ) -> Result<(), SessionError> {
        if self.state != NegotiatorState::Uninitialized {
            return Err(SessionError::invalid_state("initialize", self.state));
        }

        for track in local.tracks() {
            if let Err(e) = transport.add_track(track).await {
                if let Err(close_err) = transport.close().await {
                    warn!("Failed to close transport after setup error: {:?}", close_err);
                }
                self.attached.clear();
                return Err(SessionError::negotiation(e));
            }
            self.attached.insert(track.id().to_owned());
        }

        info!("Peer connection initialized with {} local tracks", self.attached.len());
        self.transport = Some(transport);
        self.state = NegotiatorState::Idle;
        Ok(())
    }

    /// Starts an offer round. Rejected while another round is in flight.
    pub async fn create_offer(&mut self) -> Result<SessionDescription, SessionError> {
        let base = self.state;
        let transport = match base {
            NegotiatorState::Idle | NegotiatorState::Connected => self.transport()?,
            state => return Err(SessionError::invalid_state("create-offer", state)),
        };

        let offer = transport
            .create_offer()
            .await
            .map_err(SessionError::negotiation)?;

        debug!("Local offer created");
        self.renegotiation_needed = false;
        self.pending_offer = Some(offer.clone());
        self.offer_base = base;
        self.state = NegotiatorState::OffererPending;
        Ok(offer)
    }

    /// Applies a remote offer and returns the answer to send back.
    ///
    /// If a local offer is in flight the two offers collided. The side whose
    /// own offer sorts first rolls it back and answers; the other side keeps
    /// its offer and gets `Ok(None)`.
    pub async fn handle_remote_offer(
        &mut self,
        offer: &SessionDescription,
    ) -> Result<Option<SessionDescription>, SessionError> {
        match self.state {
            NegotiatorState::Idle | NegotiatorState::Connected => {}
            NegotiatorState::OffererPending if self.yields_to(offer) => {
                info!("Offer collision, rolling back the local offer");
                self.rollback().await?;
            }
            NegotiatorState::OffererPending => {
                info!("Offer collision, keeping the local offer");
                return Ok(None);
            }
            state => return Err(SessionError::invalid_state("handle-offer", state)),
        }

        let previous = self.state;
        self.state = NegotiatorState::AnswererPending;
        let result = self.transport()?.accept_offer(offer).await;
        match result {
            Ok(answer) => {
                debug!("Remote offer applied, answer created");
                self.state = NegotiatorState::Connected;
                Ok(Some(answer))
            }
            Err(e) => {
                self.state = previous;
                Err(SessionError::negotiation(e))
            }
        }
    }

    /// Both sides compare the same two offers, so exactly one of them yields.
    fn yields_to(&self, remote: &SessionDescription) -> bool {
        self.pending_offer
            .as_ref()
            .is_none_or(|local| local.sdp <= remote.sdp)
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.transport()?
            .rollback()
            .await
            .map_err(SessionError::negotiation)?;

        self.pending_offer = None;
        self.state = self.offer_base;
        // A rolled back renegotiation still has tracks the peer has not seen.
        if self.offer_base == NegotiatorState::Connected {
            self.renegotiation_needed = true;
        }
        Ok(())
    }

    /// Completes the local offer round.
    pub async fn handle_remote_answer(
        &mut self,
        answer: &SessionDescription,
    ) -> Result<(), SessionError> {
        if self.state != NegotiatorState::OffererPending {
            return Err(SessionError::invalid_state("handle-answer", self.state));
        }

        self.transport()?
            .accept_answer(answer)
            .await
            .map_err(SessionError::negotiation)?;

        debug!("Remote answer applied");
        self.pending_offer = None;
        self.state = NegotiatorState::Connected;
        Ok(())
    }

    /// Returns whether the candidate was added. Failures are only logged.
    pub async fn add_remote_ice_candidate(&mut self, candidate: &IceCandidate) -> bool {
        if !self.is_active() {
            warn!("Dropping ICE candidate: peer connection is {}", self.state);
            return false;
        }
        let Ok(transport) = self.transport() else {
            return false;
        };
        let Err(e) = transport.add_ice_candidate(candidate).await else {
            return true;
        };
        let err = SessionError::InvalidIceCandidate(format!("{:#}", e));
        warn!("{}", err);
        false
    }

    /// Attaches tracks that are not on the connection yet. A caller that gets
    /// `Ok(n)` with `n > 0` owes the remote side a new offer.
    pub async fn add_track(&mut self, stream: &MediaStream) -> Result<usize, SessionError> {
        if !self.is_active() {
            return Err(SessionError::invalid_state("add-track", self.state));
        }

        let mut added = 0;
        for track in stream.tracks() {
            if self.attached.contains(track.id()) {
                continue;
            }
            self.attach(track).await?;
            added += 1;
        }

        if added > 0 {
            self.renegotiation_needed = true;
        }
        Ok(added)
    }

    async fn attach(&mut self, track: &MediaTrack) -> Result<(), SessionError> {
        self.transport()?
            .add_track(track)
            .await
            .map_err(SessionError::negotiation)?;
        self.attached.insert(track.id().to_owned());
        Ok(())
    }

    /// Detaches the tracks of `stream` that are on the connection. Their
    /// senders are kept for the next `add_track` of the same kind.
    pub async fn remove_track(&mut self, stream: &MediaStream) -> Result<usize, SessionError> {
        if !self.is_active() {
            return Err(SessionError::invalid_state("remove-track", self.state));
        }

        let mut removed = 0;
        for track in stream.tracks() {
            if !self.attached.contains(track.id()) {
                continue;
            }
            self.transport()?
                .remove_track(track)
                .await
                .map_err(SessionError::negotiation)?;
            self.attached.remove(track.id());
            removed += 1;
        }
        Ok(removed)
    }

    pub fn on_transport_state(&mut self, state: TransportState) {
        if self.state == NegotiatorState::Closed {
            return;
        }
        self.transport_connected = state == TransportState::Connected;
    }

    /// Closes the transport once. Calling it before `initialize` leaves the
    /// negotiator reusable.
    pub async fn close(&mut self) {
        if self.state == NegotiatorState::Uninitialized {
            return;
        }
        self.state = NegotiatorState::Closed;
        self.transport_connected = false;
        self.pending_offer = None;
        self.renegotiation_needed = false;

        let Some(transport) = self.transport.take() else {
            return;
        };
        if let Err(e) = transport.close().await {
            warn!("Failed to close peer connection: {:?}", e);
        }
        info!("Peer connection closed");
    }

    fn transport(&self) -> Result<&dyn PeerTransport, SessionError> {
        self.transport
            .as_deref()
            .ok_or_else(|| SessionError::invalid_state("use-transport", self.state))
    }

    pub fn state(&self) -> NegotiatorState {
        self.state
    }

    pub fn peer_state(&self) -> PeerConnectionState {
        match self.state {
            NegotiatorState::Uninitialized | NegotiatorState::Idle => PeerConnectionState::New,
            NegotiatorState::OffererPending | NegotiatorState::AnswererPending => {
                PeerConnectionState::Negotiating
            }
            NegotiatorState::Connected if self.transport_connected => {
                PeerConnectionState::Connected
            }
            NegotiatorState::Connected => PeerConnectionState::Negotiating,
            NegotiatorState::Closed => PeerConnectionState::Closed,
        }
    }

    /// A transport exists and has not been closed.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            NegotiatorState::Uninitialized | NegotiatorState::Closed
        )
    }

    pub fn has_pending_offer(&self) -> bool {
        self.state == NegotiatorState::OffererPending
    }

    /// The offer of the round currently in flight, if any.
    pub fn pending_offer(&self) -> Option<&SessionDescription> {
        self.pending_offer.as_ref()
    }

    pub fn renegotiation_needed(&self) -> bool {
        self.renegotiation_needed
    }
}
