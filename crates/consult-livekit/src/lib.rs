//! LiveKit-backed transport and capture engine for the consultation call
//! core.
//!
//! Implements the core's [`TransportSdk`] and [`MediaDevices`] seams on top
//! of the LiveKit Rust SDK. Platform shells feed captured frames into the
//! native sources exposed here and pull remote audio from the
//! [`PlayoutBuffer`].

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::track::{
    RemoteAudioTrack, RemoteVideoTrack, TrackKind as LkTrackKind,
    TrackSource as LkTrackSource,
};
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use livekit::webrtc::prelude::*;
use livekit::webrtc::video_source::native::NativeVideoSource;
use tokio::sync::mpsc;

use consult_core::errors::{MediaError, TransportError};
use consult_core::events::MediaKind;
use consult_core::media::{CaptureOptions, LocalMediaTrack, MediaDevices};
use consult_core::session::SessionCredentials;
use consult_core::transport::{
    RemoteMediaTrack, TransportConnection, TransportEvent, TransportSdk, TransportSession,
};

pub mod playout;

pub use playout::PlayoutBuffer;

/// Audio source options matching the playout side.
const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u32 = 1;
const AUDIO_QUEUE_SIZE_MS: u32 = 100;

/// Default capture resolution.
const VIDEO_WIDTH: u32 = 1280;
const VIDEO_HEIGHT: u32 = 720;

/// LiveKit engine: one per page session.
///
/// The channel and app id are carried in the token claims; the engine only
/// needs the signaling URL of the LiveKit deployment.
pub struct LiveKitEngine {
    server_url: String,
    playout: Arc<PlayoutBuffer>,
    initialized: AtomicBool,
}

impl LiveKitEngine {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.to_string(),
            playout: Arc::new(PlayoutBuffer::default()),
            initialized: AtomicBool::new(false),
        }
    }

    /// The buffer platform audio output (AudioTrack, cpal) pulls remote
    /// audio samples from.
    pub fn playout(&self) -> Arc<PlayoutBuffer> {
        self.playout.clone()
    }
}

#[async_trait]
impl TransportSdk for LiveKitEngine {
    fn init(&self) -> Result<(), TransportError> {
        // The SDK spawns its signaling and media tasks on the ambient
        // runtime; without one the client cannot be constructed.
        tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::InitFailed(format!("no async runtime: {e}")))?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<TransportConnection, TransportError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(TransportError::InitFailed("init() was never called".into()));
        }

        let mut options = RoomOptions::default();
        options.auto_subscribe = true;

        tracing::info!(
            "connecting to channel {} (app {})",
            credentials.channel,
            credentials.app_id
        );
        let (room, room_events) = Room::connect(&self.server_url, &credentials.token, options)
            .await
            .map_err(classify_room_error)?;
        let room = Arc::new(room);

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(translate_events(room_events, tx, self.playout.clone()));

        Ok(TransportConnection {
            session: Arc::new(LiveKitSession { room }),
            events: rx,
        })
    }
}

#[async_trait]
impl MediaDevices for LiveKitEngine {
    async fn create_camera_track(
        &self,
        _options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError> {
        // Frames are fed by the platform capture shell; device selection
        // happens there. This side only owns the RTC-facing source.
        let source = NativeVideoSource::new(
            VideoResolution {
                width: VIDEO_WIDTH,
                height: VIDEO_HEIGHT,
            },
            false, // not a screencast
        );
        let track =
            LocalVideoTrack::create_video_track("camera", RtcVideoSource::Native(source.clone()));
        Ok(Arc::new(LkLocalTrack {
            kind: MediaKind::Video,
            track: LocalTrack::Video(track),
            publication: StdMutex::new(None),
            enabled: AtomicBool::new(true),
            video_source: Some(source),
            audio_source: None,
        }))
    }

    async fn create_microphone_track(
        &self,
        _options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError> {
        let source = NativeAudioSource::new(
            AudioSourceOptions {
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
            },
            AUDIO_SAMPLE_RATE,
            AUDIO_CHANNELS,
            AUDIO_QUEUE_SIZE_MS,
        );
        let track =
            LocalAudioTrack::create_audio_track("microphone", RtcAudioSource::Native(source.clone()));
        Ok(Arc::new(LkLocalTrack {
            kind: MediaKind::Audio,
            track: LocalTrack::Audio(track),
            publication: StdMutex::new(None),
            enabled: AtomicBool::new(true),
            video_source: None,
            audio_source: Some(source),
        }))
    }
}

/// A local LiveKit track plus, once published, its publication handle.
pub struct LkLocalTrack {
    kind: MediaKind,
    track: LocalTrack,
    publication: StdMutex<Option<LocalTrackPublication>>,
    enabled: AtomicBool,
    audio_source: Option<NativeAudioSource>,
    video_source: Option<NativeVideoSource>,
}

impl LkLocalTrack {
    /// Source for the capture shell to feed PCM frames into.
    pub fn audio_source(&self) -> Option<NativeAudioSource> {
        self.audio_source.clone()
    }

    /// Source for the capture shell to feed video frames into.
    pub fn video_source(&self) -> Option<NativeVideoSource> {
        self.video_source.clone()
    }
}

impl LocalMediaTrack for LkLocalTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        // Mute goes through the publication once the track is live on the
        // channel; before that the flag alone carries the intent.
        if let Some(publication) = self.publication.lock().unwrap().as_ref() {
            if enabled {
                publication.unmute();
            } else {
                publication.mute();
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        if let Some(publication) = self.publication.lock().unwrap().take() {
            publication.mute();
        }
        // Closing the room releases the underlying RTC track and capture
        // pipeline; the capture shell stops feeding the source.
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One live LiveKit room membership.
pub struct LiveKitSession {
    room: Arc<Room>,
}

#[async_trait]
impl TransportSession for LiveKitSession {
    fn participant_id(&self) -> String {
        self.room.local_participant().identity().to_string()
    }

    async fn publish(
        &self,
        video: Option<Arc<dyn LocalMediaTrack>>,
        audio: Option<Arc<dyn LocalMediaTrack>>,
    ) -> Result<(), TransportError> {
        if let Some(track) = video {
            self.publish_one(track, LkTrackSource::Camera).await?;
        }
        if let Some(track) = audio {
            self.publish_one(track, LkTrackSource::Microphone).await?;
        }
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.room.close().await {
            tracing::warn!("error closing room: {e}");
        }
    }
}

impl LiveKitSession {
    async fn publish_one(
        &self,
        track: Arc<dyn LocalMediaTrack>,
        source: LkTrackSource,
    ) -> Result<(), TransportError> {
        let local = track
            .as_any()
            .downcast_ref::<LkLocalTrack>()
            .ok_or_else(|| {
                TransportError::PublishRejected("track was not created by this engine".into())
            })?;

        let publication = self
            .room
            .local_participant()
            .publish_track(
                local.track.clone(),
                TrackPublishOptions {
                    source,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::PublishRejected(e.to_string()))?;

        if !local.is_enabled() {
            publication.mute();
        }
        *local.publication.lock().unwrap() = Some(publication);
        tracing::info!("{:?} track published", local.kind);
        Ok(())
    }
}

/// Remote audio: played out by draining the native stream into the shared
/// playout buffer.
pub struct LkRemoteAudio {
    track: RemoteAudioTrack,
    playout: Arc<PlayoutBuffer>,
    task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RemoteMediaTrack for LkRemoteAudio {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn play(&self) {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return; // already playing
        }
        let rtc_track = self.track.rtc_track();
        let mut stream = NativeAudioStream::new(rtc_track, 48_000, 1);
        let buffer = self.playout.clone();
        let sid = self.track.sid().to_string();
        *task = Some(tokio::spawn(async move {
            tracing::info!("audio playout started for track {sid}");
            while let Some(frame) = stream.next().await {
                buffer.push(&frame.data);
            }
            tracing::info!("audio playout ended for track {sid}");
        }));
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remote video: held for the rendering shell to attach to.
pub struct LkRemoteVideo {
    track: RemoteVideoTrack,
}

impl LkRemoteVideo {
    pub fn inner(&self) -> RemoteVideoTrack {
        self.track.clone()
    }
}

impl RemoteMediaTrack for LkRemoteVideo {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn play(&self) {
        // Rendering is the shell's job; nothing to start here.
    }

    fn stop(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn classify_room_error(e: livekit::RoomError) -> TransportError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    // Failures before signaling answered mean the transport was never
    // reached; everything else is a rejection of this join.
    if lowered.contains("ws ")
        || lowered.contains("websocket")
        || lowered.contains("timed out")
        || lowered.contains("timeout")
        || lowered.contains("dns")
        || lowered.contains("connection refused")
    {
        TransportError::Unreachable(message)
    } else {
        TransportError::JoinRejected(message)
    }
}

/// Map LiveKit room events onto the core's participant lifecycle events.
async fn translate_events(
    mut events: mpsc::UnboundedReceiver<RoomEvent>,
    tx: mpsc::UnboundedSender<TransportEvent>,
    playout: Arc<PlayoutBuffer>,
) {
    while let Some(event) = events.recv().await {
        let forwarded = match event {
            RoomEvent::TrackSubscribed { track, publication: _, participant } => {
                let uid = participant.identity().to_string();
                match track {
                    RemoteTrack::Audio(audio_track) => TransportEvent::ParticipantPublished {
                        uid,
                        kind: MediaKind::Audio,
                        track: Arc::new(LkRemoteAudio {
                            track: audio_track,
                            playout: playout.clone(),
                            task: StdMutex::new(None),
                        }),
                    },
                    RemoteTrack::Video(video_track) => TransportEvent::ParticipantPublished {
                        uid,
                        kind: MediaKind::Video,
                        track: Arc::new(LkRemoteVideo { track: video_track }),
                    },
                }
            }

            RoomEvent::TrackUnsubscribed { track: _, publication, participant } => {
                let kind = match publication.kind() {
                    LkTrackKind::Audio => MediaKind::Audio,
                    LkTrackKind::Video => MediaKind::Video,
                };
                TransportEvent::ParticipantUnpublished {
                    uid: participant.identity().to_string(),
                    kind,
                }
            }

            RoomEvent::ParticipantDisconnected(participant) => TransportEvent::ParticipantLeft {
                uid: participant.identity().to_string(),
            },

            RoomEvent::Disconnected { reason } => {
                tracing::info!("room disconnected: {reason:?}");
                playout.clear();
                break;
            }

            other => {
                tracing::debug!("unhandled room event: {other:?}");
                continue;
            }
        };
        if tx.send(forwarded).is_err() {
            break;
        }
    }
    tracing::debug!("room event translation ended");
}
