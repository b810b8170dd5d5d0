//! Fake device, transport and credential backends for tests.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::{MediaError, SessionError, TransportError};
use crate::events::MediaKind;
use crate::media::{CaptureOptions, LocalMediaTrack, MediaDevices};
use crate::session::{SessionCredentials, SessionProvider};
use crate::transport::{
    RemoteMediaTrack, TransportConnection, TransportEvent, TransportSdk, TransportSession,
};

/// The credentials used by the happy-path scenario tests.
pub(crate) fn credentials() -> SessionCredentials {
    SessionCredentials {
        app_id: "app1".to_string(),
        channel: "ch-v123".to_string(),
        token: "tok-abc".to_string(),
    }
}

pub(crate) struct FakeTrack {
    kind: MediaKind,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl FakeTrack {
    pub(crate) fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl LocalMediaTrack for FakeTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct FakeDevices {
    camera_error: Mutex<Option<MediaError>>,
    microphone_error: Mutex<Option<MediaError>>,
    created: Mutex<Vec<Arc<FakeTrack>>>,
}

impl FakeDevices {
    pub(crate) fn new() -> Self {
        Self {
            camera_error: Mutex::new(None),
            microphone_error: Mutex::new(None),
            created: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_camera(&self, error: MediaError) {
        *self.camera_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_microphone(&self, error: MediaError) {
        *self.microphone_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn clear_failures(&self) {
        *self.camera_error.lock().unwrap() = None;
        *self.microphone_error.lock().unwrap() = None;
    }

    pub(crate) fn created_tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.created.lock().unwrap().clone()
    }

    fn create(&self, kind: MediaKind, error: &Mutex<Option<MediaError>>) -> Result<Arc<dyn LocalMediaTrack>, MediaError> {
        if let Some(error) = error.lock().unwrap().clone() {
            return Err(error);
        }
        let track = Arc::new(FakeTrack::new(kind));
        self.created.lock().unwrap().push(track.clone());
        Ok(track)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn create_camera_track(
        &self,
        _options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError> {
        self.create(MediaKind::Video, &self.camera_error)
    }

    async fn create_microphone_track(
        &self,
        _options: &CaptureOptions,
    ) -> Result<Arc<dyn LocalMediaTrack>, MediaError> {
        self.create(MediaKind::Audio, &self.microphone_error)
    }
}

pub(crate) struct FakeRemoteTrack {
    kind: MediaKind,
    playing: AtomicBool,
    stopped: AtomicBool,
}

impl FakeRemoteTrack {
    pub(crate) fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            playing: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl RemoteMediaTrack for FakeRemoteTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct FakeSession {
    participant_id: String,
    closed: AtomicBool,
    publish_error: Mutex<Option<TransportError>>,
    published: Mutex<Vec<Arc<dyn LocalMediaTrack>>>,
}

impl FakeSession {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn published_tracks(&self) -> Vec<Arc<dyn LocalMediaTrack>> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    fn participant_id(&self) -> String {
        self.participant_id.clone()
    }

    async fn publish(
        &self,
        video: Option<Arc<dyn LocalMediaTrack>>,
        audio: Option<Arc<dyn LocalMediaTrack>>,
    ) -> Result<(), TransportError> {
        if let Some(error) = self.publish_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut published = self.published.lock().unwrap();
        published.extend(video);
        published.extend(audio);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct FakeSdk {
    init_count: AtomicUsize,
    init_error: Mutex<Option<TransportError>>,
    connect_error: Mutex<Option<TransportError>>,
    pending_publish_error: Mutex<Option<TransportError>>,
    last_credentials: Mutex<Option<SessionCredentials>>,
    connections: Mutex<Vec<(Arc<FakeSession>, mpsc::UnboundedSender<TransportEvent>)>>,
}

impl FakeSdk {
    pub(crate) fn new() -> Self {
        Self {
            init_count: AtomicUsize::new(0),
            init_error: Mutex::new(None),
            connect_error: Mutex::new(None),
            pending_publish_error: Mutex::new(None),
            last_credentials: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_init(&self, error: TransportError) {
        *self.init_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_connect(&self, error: TransportError) {
        *self.connect_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_publish(&self, error: TransportError) {
        *self.pending_publish_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub(crate) fn sessions(&self) -> Vec<Arc<FakeSession>> {
        self.connections.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub(crate) fn last_credentials(&self) -> Option<SessionCredentials> {
        self.last_credentials.lock().unwrap().clone()
    }

    /// Inject a transport event as if it came from connection `index`.
    pub(crate) fn emit(&self, index: usize, event: TransportEvent) {
        let connections = self.connections.lock().unwrap();
        connections[index]
            .1
            .send(event)
            .expect("connection event channel closed");
    }
}

#[async_trait]
impl TransportSdk for FakeSdk {
    fn init(&self) -> Result<(), TransportError> {
        if let Some(error) = self.init_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.init_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<TransportConnection, TransportError> {
        if let Some(error) = self.connect_error.lock().unwrap().clone() {
            return Err(error);
        }
        *self.last_credentials.lock().unwrap() = Some(credentials.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(FakeSession {
            participant_id: "patient-1".to_string(),
            closed: AtomicBool::new(false),
            publish_error: Mutex::new(self.pending_publish_error.lock().unwrap().clone()),
            published: Mutex::new(Vec::new()),
        });
        self.connections.lock().unwrap().push((session.clone(), tx));

        Ok(TransportConnection { session, events: rx })
    }
}

pub(crate) struct FakeSessions {
    credentials: Mutex<SessionCredentials>,
    error: Mutex<Option<SessionError>>,
    fetch_count: AtomicUsize,
}

impl FakeSessions {
    pub(crate) fn new() -> Self {
        Self {
            credentials: Mutex::new(credentials()),
            error: Mutex::new(None),
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fail(&self, error: SessionError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeSessions {
    async fn fetch_session(&self, _visit_id: &str) -> Result<SessionCredentials, SessionError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.credentials.lock().unwrap().clone())
    }
}
