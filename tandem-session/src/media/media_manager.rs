use crate::error::SessionError;
use crate::media::{MediaDevices, MediaStream, StreamKind, TrackKind};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the local camera and screen streams of a session.
pub struct MediaSourceManager {
    devices: Arc<dyn MediaDevices>,
    camera: Option<MediaStream>,
    screen: Option<MediaStream>,
}

impl MediaSourceManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            camera: None,
            screen: None,
        }
    }

    /// Camera + microphone. Reuses the current stream if one is live.
    pub async fn acquire_local_media(&mut self) -> Result<MediaStream, SessionError> {
        if let Some(stream) = &self.camera {
            return Ok(stream.clone());
        }

        let stream = self.devices.user_media().await?;
        info!(
            "Local media acquired: {} ({} tracks)",
            stream.id(),
            stream.tracks().len()
        );
        self.camera = Some(stream.clone());
        Ok(stream)
    }

    pub async fn acquire_screen_capture(&mut self) -> Result<MediaStream, SessionError> {
        if let Some(stream) = &self.screen {
            return Ok(stream.clone());
        }

        let stream = self.devices.display_media().await?;
        info!("Screen capture acquired: {}", stream.id());
        self.screen = Some(stream.clone());
        Ok(stream)
    }

    /// Flips the enabled flag of every camera-stream track of `kind` in
    /// place. Returns how many tracks were touched.
    pub fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> usize {
        let Some(stream) = &self.camera else {
            return 0;
        };
        let mut touched = 0;
        for track in stream.tracks_of(kind) {
            track.set_enabled(enabled);
            touched += 1;
        }
        debug!("{} {} track(s) enabled={}", touched, kind, enabled);
        touched
    }

    /// Inverts the current state of `kind`. `None` without a camera stream.
    pub fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let enabled = !self.is_track_enabled(kind)?;
        self.set_track_enabled(kind, enabled);
        Some(enabled)
    }

    pub fn is_track_enabled(&self, kind: TrackKind) -> Option<bool> {
        let stream = self.camera.as_ref()?;
        let mut tracks = stream.tracks_of(kind).peekable();
        tracks.peek()?;
        Some(tracks.any(|t| t.is_enabled()))
    }

    /// Stops every track of the stream and forgets it. Returns false when
    /// there was nothing to release.
    pub fn release(&mut self, kind: StreamKind) -> bool {
        let slot = match kind {
            StreamKind::Camera => &mut self.camera,
            StreamKind::Screen => &mut self.screen,
        };
        let Some(stream) = slot.take() else {
            return false;
        };
        let stopped = stream.stop();
        debug!("Released {:?} stream {} ({} tracks stopped)", kind, stream.id(), stopped);
        true
    }

    pub fn camera(&self) -> Option<&MediaStream> {
        self.camera.as_ref()
    }

    pub fn screen(&self) -> Option<&MediaStream> {
        self.screen.as_ref()
    }

    pub fn is_sharing_screen(&self) -> bool {
        self.screen.is_some()
    }
}
