use crate::error::SessionError;
use crate::media::{MediaStream, MediaTrack, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Source of capture streams. A platform capturer implements this; the
/// session only ever asks for a camera+microphone stream or a screen stream.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn user_media(&self) -> Result<MediaStream, SessionError>;

    async fn display_media(&self) -> Result<MediaStream, SessionError>;
}

/// Devices that hand out VP8/Opus sample tracks without producing frames.
/// Used by the headless CLI and tests; either source can be set to refuse.
#[derive(Debug, Clone, Default)]
pub struct SyntheticDevices {
    deny_camera: bool,
    deny_screen: bool,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_camera(mut self) -> Self {
        self.deny_camera = true;
        self
    }

    pub fn deny_screen(mut self) -> Self {
        self.deny_screen = true;
        self
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn user_media(&self) -> Result<MediaStream, SessionError> {
        if self.deny_camera {
            return Err(SessionError::MediaAccessDenied(
                "permission refused by device policy".to_owned(),
            ));
        }

        let stream_id = format!("camera-{}", Uuid::new_v4());
        let tracks = vec![
            Arc::new(MediaTrack::local(
                TrackKind::Audio,
                format!("{}-audio", stream_id),
                stream_id.clone(),
            )),
            Arc::new(MediaTrack::local(
                TrackKind::Video,
                format!("{}-video", stream_id),
                stream_id.clone(),
            )),
        ];
        Ok(MediaStream::new(stream_id, tracks))
    }

    async fn display_media(&self) -> Result<MediaStream, SessionError> {
        if self.deny_screen {
            return Err(SessionError::ScreenCaptureDenied(
                "permission refused by device policy".to_owned(),
            ));
        }

        let stream_id = format!("screen-{}", Uuid::new_v4());
        let track = MediaTrack::local(
            TrackKind::Video,
            format!("{}-video", stream_id),
            stream_id.clone(),
        );
        Ok(MediaStream::new(stream_id, vec![Arc::new(track)]))
    }
}
