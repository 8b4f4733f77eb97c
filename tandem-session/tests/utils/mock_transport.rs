use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tandem_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use tandem_session::media::{MediaTrack, TrackKind};
use tandem_session::negotiator::{
    PeerTransport, RemoteTrackInfo, TransportEvent, TransportFactory, TransportState,
};
use tokio::sync::mpsc;

/// Per-transport counters visible to tests.
#[derive(Debug, Default)]
pub struct SimStats {
    pub offers: AtomicUsize,
    pub answers: AtomicUsize,
    pub closes: AtomicUsize,
    pub remote_candidates: AtomicUsize,
    pub senders: AtomicUsize,
    pub rollbacks: AtomicUsize,
    failing_offers: AtomicBool,
}

impl SimStats {
    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> usize {
        self.answers.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn senders(&self) -> usize {
        self.senders.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Makes `create_offer` fail until switched off again.
    pub fn set_failing_offers(&self, failing: bool) {
        self.failing_offers.store(failing, Ordering::SeqCst);
    }
}

/// One sender on the simulated connection. Its id is the id of the first
/// track it carried and does not change when the track is swapped.
struct Slot {
    id: String,
    kind: TrackKind,
    track: Option<String>,
}

#[derive(Default)]
struct SimInner {
    slots: Vec<Slot>,
    seen_remote: HashSet<String>,
    has_local: bool,
    has_remote: bool,
    candidate_sent: bool,
    remote_candidate: bool,
    connected: bool,
    closed: bool,
}

/// In-process stand-in for a peer connection. The "SDP" it produces lists
/// the local tracks, so the other side can report them as remote tracks.
pub struct SimTransport {
    id: usize,
    inner: Mutex<SimInner>,
    events: mpsc::Sender<TransportEvent>,
    stats: Arc<SimStats>,
}

impl SimTransport {
    fn describe(&self) -> String {
        let inner = self.inner.lock().unwrap();
        let entries: Vec<_> = inner
            .slots
            .iter()
            .map(|slot| format!("{}|{}|remote-{}", slot.id, slot.kind, self.id))
            .collect();
        format!("sim {} {}", self.id, entries.join(","))
    }

    fn parse_tracks(sdp: &str) -> Result<Vec<RemoteTrackInfo>> {
        let mut parts = sdp.split_whitespace();
        if parts.next() != Some("sim") {
            bail!("not a simulated description");
        }
        parts.next().ok_or_else(|| anyhow!("missing transport id"))?;

        let Some(list) = parts.next() else {
            return Ok(Vec::new());
        };
        list.split(',')
            .map(|entry| {
                let mut fields = entry.split('|');
                let (Some(id), Some(kind), Some(stream_id)) =
                    (fields.next(), fields.next(), fields.next())
                else {
                    bail!("bad track entry '{}'", entry);
                };
                let kind = match kind {
                    "audio" => TrackKind::Audio,
                    "video" => TrackKind::Video,
                    other => bail!("bad track kind '{}'", other),
                };
                Ok(RemoteTrackInfo {
                    id: id.to_owned(),
                    stream_id: stream_id.to_owned(),
                    kind,
                })
            })
            .collect()
    }

    async fn apply_remote(&self, sdp: &str) -> Result<()> {
        let tracks = Self::parse_tracks(sdp)?;
        let fresh: Vec<_> = {
            let mut inner = self.inner.lock().unwrap();
            inner.has_remote = true;
            tracks
                .into_iter()
                .filter(|t| inner.seen_remote.insert(t.id.clone()))
                .collect()
        };
        for track in fresh {
            let _ = self.events.send(TransportEvent::RemoteTrack(track)).await;
        }
        self.maybe_connect().await;
        Ok(())
    }

    async fn local_applied(&self) {
        let send_candidate = {
            let mut inner = self.inner.lock().unwrap();
            inner.has_local = true;
            !std::mem::replace(&mut inner.candidate_sent, true)
        };
        if send_candidate {
            let candidate = IceCandidate {
                candidate: format!(
                    "candidate:{} 1 udp 2130706431 127.0.0.1 {} typ host",
                    self.id,
                    40000 + self.id
                ),
                sdp_mid: Some("0".to_owned()),
                sdp_m_line_index: Some(0),
                username_fragment: None,
            };
            let _ = self
                .events
                .send(TransportEvent::CandidateGenerated(candidate))
                .await;
        }
    }

    async fn maybe_connect(&self) {
        let connect = {
            let mut inner = self.inner.lock().unwrap();
            let ready = inner.has_local && inner.has_remote && inner.remote_candidate;
            if ready && !inner.connected && !inner.closed {
                inner.connected = true;
                true
            } else {
                false
            }
        };
        if connect {
            for state in [TransportState::Connecting, TransportState::Connected] {
                let _ = self.events.send(TransportEvent::StateChanged(state)).await;
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.lock().unwrap().closed {
            bail!("transport is closed");
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for SimTransport {
    async fn add_track(&self, track: &MediaTrack) -> Result<()> {
        self.ensure_open()?;
        if track.rtc_track().is_none() {
            bail!("track {} is not local", track.id());
        }
        let mut inner = self.inner.lock().unwrap();
        let parked = inner
            .slots
            .iter_mut()
            .find(|slot| slot.kind == track.kind() && slot.track.is_none());
        match parked {
            Some(slot) => slot.track = Some(track.id().to_owned()),
            None => {
                self.stats.senders.fetch_add(1, Ordering::SeqCst);
                inner.slots.push(Slot {
                    id: track.id().to_owned(),
                    kind: track.kind(),
                    track: Some(track.id().to_owned()),
                });
            }
        }
        Ok(())
    }

    async fn remove_track(&self, track: &MediaTrack) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner
            .slots
            .iter_mut()
            .find(|slot| slot.track.as_deref() == Some(track.id()))
        {
            slot.track = None;
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        if self.stats.failing_offers.load(Ordering::SeqCst) {
            bail!("offer creation failed");
        }
        self.stats.offers.fetch_add(1, Ordering::SeqCst);
        let offer = SessionDescription::offer(self.describe());
        self.local_applied().await;
        Ok(offer)
    }

    async fn accept_offer(&self, offer: &SessionDescription) -> Result<SessionDescription> {
        self.ensure_open()?;
        if offer.kind != SdpKind::Offer {
            bail!("expected an offer");
        }
        self.apply_remote(&offer.sdp).await?;
        self.stats.answers.fetch_add(1, Ordering::SeqCst);
        let answer = SessionDescription::answer(self.describe());
        self.local_applied().await;
        self.maybe_connect().await;
        Ok(answer)
    }

    async fn accept_answer(&self, answer: &SessionDescription) -> Result<()> {
        self.ensure_open()?;
        if answer.kind != SdpKind::Answer {
            bail!("expected an answer");
        }
        self.apply_remote(&answer.sdp).await
    }

    async fn rollback(&self) -> Result<()> {
        self.ensure_open()?;
        self.inner.lock().unwrap().has_local = false;
        self.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.ensure_open()?;
        if !candidate.candidate.starts_with("candidate:") {
            bail!("malformed candidate '{}'", candidate.candidate);
        }
        self.stats.remote_candidates.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap().remote_candidate = true;
        self.maybe_connect().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        let was_closed = std::mem::replace(&mut self.inner.lock().unwrap().closed, true);
        if !was_closed {
            let _ = self
                .events
                .send(TransportEvent::StateChanged(TransportState::Closed))
                .await;
        }
        Ok(())
    }
}

/// Hands out [`SimTransport`]s and keeps their stats.
#[derive(Default)]
pub struct SimTransportFactory {
    created: Mutex<Vec<Arc<SimStats>>>,
}

impl SimTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn stats(&self, index: usize) -> Arc<SimStats> {
        self.created.lock().unwrap()[index].clone()
    }

    pub fn total_offers(&self) -> usize {
        self.created.lock().unwrap().iter().map(|s| s.offers()).sum()
    }

    pub fn total_answers(&self) -> usize {
        self.created.lock().unwrap().iter().map(|s| s.answers()).sum()
    }
}

#[async_trait]
impl TransportFactory for SimTransportFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        let stats = Arc::new(SimStats::default());
        let id = {
            let mut created = self.created.lock().unwrap();
            created.push(stats.clone());
            created.len()
        };
        Ok(Box::new(SimTransport {
            id,
            inner: Mutex::new(SimInner::default()),
            events,
            stats,
        }))
    }
}
