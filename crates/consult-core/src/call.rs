use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use crate::errors::CallError;
use crate::events::{CallEvent, CallEventListener, CallPhase, EventEmitter, MediaKind};
use crate::media::{CaptureOptions, LocalMedia, MediaDevices};
use crate::participants::{ParticipantRegistry, RemoteParticipant};
use crate::session::SessionProvider;
use crate::settings::Settings;
use crate::transport::{TransportAdapter, TransportSdk};
use crate::visit::VisitContext;

/// Mutable call state behind the live-state cell.
///
/// The forced cleanup path dereferences this cell at the instant it runs,
/// so it always observes the latest phase and track handles instead of a
/// snapshot captured at registration time. Never held across an await.
struct CallShared {
    phase: CallPhase,
    error: Option<CallError>,
    media: LocalMedia,
    local_participant_id: Option<String>,
}

/// Orchestrates one consultation call: credential fetch, local media
/// acquisition, transport join/publish, toggles and teardown.
///
/// At most one Connecting/Joined session exists per manager; a new
/// `join_call` while a session is live force-leaves it first.
pub struct CallManager {
    visit: Arc<VisitContext>,
    sessions: Arc<dyn SessionProvider>,
    devices: Arc<dyn MediaDevices>,
    transport: TransportAdapter,
    registry: Arc<StdMutex<ParticipantRegistry>>,
    emitter: EventEmitter,
    capture_options: CaptureOptions,
    shared: Arc<StdMutex<CallShared>>,
    // Serializes join/leave so a second join awaits the first and then
    // force-leaves it. Toggles and the forced cleanup path bypass this.
    op_lock: Mutex<()>,
}

impl CallManager {
    pub fn new(
        visit: Arc<VisitContext>,
        sessions: Arc<dyn SessionProvider>,
        devices: Arc<dyn MediaDevices>,
        sdk: Arc<dyn TransportSdk>,
        settings: &Settings,
    ) -> Self {
        let registry = Arc::new(StdMutex::new(ParticipantRegistry::new()));
        let emitter = EventEmitter::new();
        let transport = TransportAdapter::new(sdk, registry.clone(), emitter.clone());
        Self {
            visit,
            sessions,
            devices,
            transport,
            registry,
            emitter,
            capture_options: settings.capture_options(),
            shared: Arc::new(StdMutex::new(CallShared {
                phase: CallPhase::Idle,
                error: None,
                media: LocalMedia::new(
                    settings.camera_enabled_on_join,
                    settings.mic_enabled_on_join,
                ),
                local_participant_id: None,
            })),
            op_lock: Mutex::new(()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        self.emitter.add_listener(listener);
    }

    /// Construct the transport client. Called once per page lifetime,
    /// before the first join; a failure here is fatal for the page.
    pub fn initialize(&self) -> Result<(), CallError> {
        if let Err(e) = self.transport.initialize() {
            let error = CallError::from(e);
            self.fail(error.clone());
            return Err(error);
        }
        Ok(())
    }

    pub fn visit(&self) -> &VisitContext {
        &self.visit
    }

    pub fn phase(&self) -> CallPhase {
        self.shared.lock().unwrap().phase
    }

    pub fn current_error(&self) -> Option<CallError> {
        self.shared.lock().unwrap().error.clone()
    }

    pub fn is_video_enabled(&self) -> bool {
        self.shared.lock().unwrap().media.video_enabled()
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.shared.lock().unwrap().media.audio_enabled()
    }

    pub fn local_participant_id(&self) -> Option<String> {
        self.shared.lock().unwrap().local_participant_id.clone()
    }

    pub fn participants(&self) -> Vec<RemoteParticipant> {
        self.registry.lock().unwrap().list().to_vec()
    }

    pub fn primary_participant(&self) -> Option<RemoteParticipant> {
        self.registry.lock().unwrap().primary().cloned()
    }

    /// Join the call: fetch credentials, acquire local media, join the
    /// transport channel and publish. Any failure is classified, rolled
    /// back and surfaced as the current error.
    pub async fn join_call(&self) -> Result<(), CallError> {
        let _op = self.op_lock.lock().await;

        // Idempotent re-entry: a join while a session is live (or half
        // torn down) fully leaves it before starting over.
        let needs_teardown = {
            let shared = self.shared.lock().unwrap();
            !matches!(shared.phase, CallPhase::Idle | CallPhase::Failed)
                || shared.media.has_tracks()
        } || self.transport.is_connected();
        if needs_teardown {
            self.teardown().await;
        }

        {
            let mut shared = self.shared.lock().unwrap();
            shared.error = None;
            shared.phase = CallPhase::Connecting;
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Connecting));

        match self.join_inner().await {
            Ok(()) => Ok(()),
            Err(error) => {
                self.drain_registry();
                self.fail(error.clone());
                Err(error)
            }
        }
    }

    fn drain_registry(&self) {
        let tracks = self.registry.lock().unwrap().clear();
        for track in tracks {
            track.stop();
        }
    }

    async fn join_inner(&self) -> Result<(), CallError> {
        // Credentials are time-limited: requested fresh for every attempt.
        let credentials = self
            .sessions
            .fetch_session(&self.visit.visit_id)
            .await
            .map_err(CallError::from)?;
        if self.abandoned() {
            return Ok(());
        }

        // Local media before any network negotiation, so device errors
        // surface first. Rollback on partial acquisition happens inside.
        let (video, audio) = LocalMedia::acquire(self.devices.as_ref(), &self.capture_options)
            .await
            .map_err(CallError::from)?;
        if self.abandoned() {
            video.stop();
            audio.stop();
            return Ok(());
        }

        let (participant_id, _epoch) = match self.transport.join(&credentials).await {
            Ok(joined) => joined,
            Err(e) => {
                video.stop();
                audio.stop();
                return Err(e.into());
            }
        };
        if self.abandoned() {
            video.stop();
            audio.stop();
            self.transport.leave().await;
            self.drain_registry();
            return Ok(());
        }

        if let Err(e) = self.transport.publish(Some(video.clone()), Some(audio.clone())).await {
            video.stop();
            audio.stop();
            self.transport.leave().await;
            return Err(e.into());
        }
        if self.abandoned() {
            video.stop();
            audio.stop();
            self.transport.leave().await;
            self.drain_registry();
            return Ok(());
        }

        {
            let mut shared = self.shared.lock().unwrap();
            shared.media.install(video, audio);
            shared.local_participant_id = Some(participant_id);
            shared.phase = CallPhase::Joined;
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Joined));
        tracing::info!("call joined for visit {}", self.visit.visit_id);
        Ok(())
    }

    /// Whether a forced teardown ran while this join attempt was suspended.
    fn abandoned(&self) -> bool {
        self.shared.lock().unwrap().phase != CallPhase::Connecting
    }

    /// Leave the call. Safe to call when already idle.
    pub async fn leave_call(&self) {
        let _op = self.op_lock.lock().await;

        let already_idle = {
            let shared = self.shared.lock().unwrap();
            shared.phase == CallPhase::Idle && !shared.media.has_tracks()
        } && !self.transport.is_connected();
        if already_idle {
            return;
        }

        self.set_phase(CallPhase::Leaving);
        self.teardown().await;
    }

    /// Toggle the camera. Before a track exists this only records intent;
    /// the eventually acquired track is created in the recorded state.
    pub fn toggle_video(&self) -> bool {
        let enabled = {
            let mut shared = self.shared.lock().unwrap();
            let enabled = !shared.media.video_enabled();
            shared.media.set_video_enabled(enabled);
            enabled
        };
        self.emitter.emit(CallEvent::LocalMediaToggled {
            kind: MediaKind::Video,
            enabled,
        });
        enabled
    }

    /// Toggle the microphone. Same pre-join intent semantics as
    /// [`Self::toggle_video`].
    pub fn toggle_audio(&self) -> bool {
        let enabled = {
            let mut shared = self.shared.lock().unwrap();
            let enabled = !shared.media.audio_enabled();
            shared.media.set_audio_enabled(enabled);
            enabled
        };
        self.emitter.emit(CallEvent::LocalMediaToggled {
            kind: MediaKind::Audio,
            enabled,
        });
        enabled
    }

    /// Unconditional cleanup path for unmount/navigation away.
    ///
    /// Runs synchronously off the live-state cell rather than through the
    /// async leave chain: tracks are stopped on the spot, the transport
    /// close is detached onto the runtime, and the phase is forced through
    /// `Leaving` to `Idle`. Safe to call repeatedly and from any phase.
    pub fn shutdown(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.phase == CallPhase::Idle
                && !shared.media.has_tracks()
                && !self.transport.is_connected()
            {
                return;
            }
            shared.phase = CallPhase::Leaving;
            shared.media.release();
            shared.local_participant_id = None;
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Leaving));

        self.transport.abandon();
        self.drain_registry();

        {
            let mut shared = self.shared.lock().unwrap();
            shared.phase = CallPhase::Idle;
            shared.error = None;
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Idle));
        tracing::info!("call shut down for visit {}", self.visit.visit_id);
    }

    /// Graceful teardown: local media first, then the transport channel,
    /// then the registry. Releasing the transport before local media risks
    /// re-negotiating tracks mid-teardown.
    async fn teardown(&self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.media.release();
            shared.local_participant_id = None;
        }
        self.transport.leave().await;
        self.drain_registry();
        {
            let mut shared = self.shared.lock().unwrap();
            shared.phase = CallPhase::Idle;
            shared.error = None;
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Idle));
    }

    fn set_phase(&self, phase: CallPhase) {
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.phase == phase {
                return;
            }
            shared.phase = phase;
        }
        self.emitter.emit(CallEvent::PhaseChanged(phase));
    }

    fn fail(&self, error: CallError) {
        tracing::warn!("call failed ({:?}): {error}", error.kind);
        {
            let mut shared = self.shared.lock().unwrap();
            shared.phase = CallPhase::Failed;
            shared.error = Some(error.clone());
        }
        self.emitter.emit(CallEvent::PhaseChanged(CallPhase::Failed));
        self.emitter.emit(CallEvent::CallFailed(error));
    }
}
