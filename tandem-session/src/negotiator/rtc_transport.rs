use crate::media::{MediaTrack, TrackKind};
use crate::negotiator::transport::{
    PeerTransport, RemoteTrackInfo, TransportEvent, TransportFactory, TransportState,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tandem_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;

/// `PeerTransport` backed by a webrtc peer connection.
pub struct RtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    senders: Mutex<Senders>,
}

#[derive(Default)]
struct Senders {
    /// Keyed by local track id.
    active: HashMap<String, Arc<RTCRtpSender>>,
    parked: Vec<(TrackKind, Arc<RTCRtpSender>)>,
}

impl RtcTransport {
    /// Builds the peer connection and wires its callbacks into `event_tx`.
    pub async fn new(
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let state = match s {
                        RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => {
                            TransportState::New
                        }
                        RTCPeerConnectionState::Connecting => TransportState::Connecting,
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(state)).await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx.send(TransportEvent::CandidateGenerated(candidate)).await;
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    other => {
                        warn!("Ignoring remote track of kind {:?}", other);
                        return;
                    }
                };
                let info = RemoteTrackInfo {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind,
                };
                debug!("Remote track arrived: {:?}", info);
                let _ = tx.send(TransportEvent::RemoteTrack(info)).await;
            })
        }));

        Ok(Self {
            peer_connection,
            senders: Mutex::new(Senders::default()),
        })
    }

    fn to_rtc(description: &SessionDescription) -> Result<RTCSessionDescription> {
        let sdp = description.sdp.clone();
        let desc = match description.kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        Ok(desc)
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn add_track(&self, track: &MediaTrack) -> Result<()> {
        let local = track
            .rtc_track()
            .ok_or_else(|| anyhow!("track {} is not a local track", track.id()))?
            as Arc<dyn TrackLocal + Send + Sync>;

        let parked = {
            let mut senders = self.senders.lock().await;
            let slot = senders.parked.iter().position(|(kind, _)| *kind == track.kind());
            slot.map(|i| senders.parked.swap_remove(i).1)
        };

        if let Some(sender) = parked {
            if let Err(e) = sender.replace_track(Some(local)).await {
                self.senders.lock().await.parked.push((track.kind(), sender));
                return Err(e)
                    .with_context(|| format!("Failed to reuse sender for {}", track.id()));
            }
            debug!("Reused parked sender for track {}", track.id());
            self.senders
                .lock()
                .await
                .active
                .insert(track.id().to_owned(), sender);
            return Ok(());
        }

        let rtp_sender = self
            .peer_connection
            .add_track(local)
            .await
            .with_context(|| format!("Failed to attach track {}", track.id()))?;

        // RTCP has to be drained for interceptors to work.
        let rtcp_sender = rtp_sender.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        self.senders
            .lock()
            .await
            .active
            .insert(track.id().to_owned(), rtp_sender);
        Ok(())
    }

    async fn remove_track(&self, track: &MediaTrack) -> Result<()> {
        let Some(sender) = self.senders.lock().await.active.remove(track.id()) else {
            return Ok(());
        };
        sender
            .replace_track(None)
            .await
            .with_context(|| format!("Failed to detach track {}", track.id()))?;
        self.senders.lock().await.parked.push((track.kind(), sender));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to apply local offer")?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn accept_offer(&self, offer: &SessionDescription) -> Result<SessionDescription> {
        if offer.kind != SdpKind::Offer {
            return Err(anyhow!("expected an offer, got {:?}", offer.kind));
        }
        self.peer_connection
            .set_remote_description(Self::to_rtc(offer)?)
            .await
            .context("Failed to apply remote offer")?;

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to apply local answer")?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn accept_answer(&self, answer: &SessionDescription) -> Result<()> {
        if answer.kind != SdpKind::Answer {
            return Err(anyhow!("expected an answer, got {:?}", answer.kind));
        }
        self.peer_connection
            .set_remote_description(Self::to_rtc(answer)?)
            .await
            .context("Failed to apply remote answer")?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let Some(local) = self.peer_connection.pending_local_description().await else {
            return Err(anyhow!("no local offer to roll back"));
        };
        let mut rollback = RTCSessionDescription::default();
        rollback.sdp_type = RTCSdpType::Rollback;
        rollback.sdp = local.sdp;
        self.peer_connection
            .set_local_description(rollback)
            .await
            .context("Failed to roll back local offer")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate.clone(),
            sdp_mid: candidate.sdp_mid.clone(),
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment.clone(),
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Creates an [`RtcTransport`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        let transport = RtcTransport::new(ice_servers, events).await?;
        Ok(Box::new(transport))
    }
}
