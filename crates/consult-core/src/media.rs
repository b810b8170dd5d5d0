use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::MediaError;
use crate::events::MediaKind;

/// Device hints passed to the capture layer.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub preferred_camera: Option<String>,
    pub preferred_microphone: Option<String>,
}

/// A live handle to a local capture track.
///
/// Enabling/disabling mutates the track in place; `stop` releases the
/// underlying device and is idempotent.
pub trait LocalMediaTrack: Send + Sync {
    fn kind(&self) -> MediaKind;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn stop(&self);
    fn as_any(&self) -> &dyn Any;
}

/// Camera/microphone acquisition seam implemented by platform backends.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn create_camera_track(
        &self,
        options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError>;

    async fn create_microphone_track(
        &self,
        options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError>;
}

/// Local capture state, exclusively owned by the call state machine.
///
/// The enabled flags record user intent even while no track exists yet
/// (the "camera off" UI before join); freshly acquired tracks are created
/// with the flags applied.
pub struct LocalMedia {
    video_track: Option<Arc<dyn LocalMediaTrack>>,
    audio_track: Option<Arc<dyn LocalMediaTrack>>,
    video_enabled: bool,
    audio_enabled: bool,
}

impl LocalMedia {
    pub fn new(video_enabled: bool, audio_enabled: bool) -> Self {
        Self {
            video_track: None,
            audio_track: None,
            video_enabled,
            audio_enabled,
        }
    }

    /// Request camera and microphone access.
    ///
    /// Acquisition is not atomic, but it is all-or-nothing: if the
    /// microphone fails after the camera succeeded, the camera track is
    /// stopped before the error surfaces so no open device leaks.
    pub async fn acquire(
        devices: &dyn MediaDevices,
        options: &CaptureOptions,
    ) -> Result<(Arc<dyn LocalMediaTrack>, Arc<dyn LocalMediaTrack>), MediaError> {
        let video = devices.create_camera_track(options).await?;
        let audio = match devices.create_microphone_track(options).await {
            Ok(track) => track,
            Err(e) => {
                video.stop();
                return Err(e);
            }
        };
        Ok((video, audio))
    }

    /// Take ownership of freshly acquired tracks and apply the current
    /// intent flags to them.
    pub fn install(
        &mut self,
        video: Arc<dyn LocalMediaTrack>,
        audio: Arc<dyn LocalMediaTrack>,
    ) {
        video.set_enabled(self.video_enabled);
        audio.set_enabled(self.audio_enabled);
        self.video_track = Some(video);
        self.audio_track = Some(audio);
    }

    pub fn set_video_enabled(&mut self, enabled: bool) {
        self.video_enabled = enabled;
        if let Some(track) = &self.video_track {
            track.set_enabled(enabled);
        }
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
        if let Some(track) = &self.audio_track {
            track.set_enabled(enabled);
        }
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn video_track(&self) -> Option<Arc<dyn LocalMediaTrack>> {
        self.video_track.clone()
    }

    pub fn audio_track(&self) -> Option<Arc<dyn LocalMediaTrack>> {
        self.audio_track.clone()
    }

    pub fn has_tracks(&self) -> bool {
        self.video_track.is_some() || self.audio_track.is_some()
    }

    /// Stop and drop both tracks. Safe to call repeatedly and with no
    /// tracks present.
    pub fn release(&mut self) {
        if let Some(track) = self.video_track.take() {
            track.stop();
        }
        if let Some(track) = self.audio_track.take() {
            track.stop();
        }
    }
}
