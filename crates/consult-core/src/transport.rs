use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::events::{CallEvent, EventEmitter, MediaKind};
use crate::media::LocalMediaTrack;
use crate::participants::ParticipantRegistry;
use crate::session::SessionCredentials;

/// A live handle to a remote participant's published track.
pub trait RemoteMediaTrack: Send + Sync {
    fn kind(&self) -> MediaKind;
    /// Start play-out immediately. No-op for kinds the shell renders itself.
    fn play(&self);
    /// Stop play-out and drop backend resources tied to this handle.
    fn stop(&self);
    fn as_any(&self) -> &dyn Any;
}

/// Participant lifecycle events surfaced by the transport SDK.
pub enum TransportEvent {
    ParticipantPublished {
        uid: String,
        kind: MediaKind,
        track: Arc<dyn RemoteMediaTrack>,
    },
    ParticipantUnpublished {
        uid: String,
        kind: MediaKind,
    },
    ParticipantLeft {
        uid: String,
    },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParticipantPublished { uid, kind, .. } => f
                .debug_struct("ParticipantPublished")
                .field("uid", uid)
                .field("kind", kind)
                .finish_non_exhaustive(),
            Self::ParticipantUnpublished { uid, kind } => f
                .debug_struct("ParticipantUnpublished")
                .field("uid", uid)
                .field("kind", kind)
                .finish(),
            Self::ParticipantLeft { uid } => {
                f.debug_struct("ParticipantLeft").field("uid", uid).finish()
            }
        }
    }
}

/// One live connection to the transport channel.
#[async_trait]
pub trait TransportSession: Send + Sync {
    fn participant_id(&self) -> String;

    /// Publish local tracks to the channel. Valid only once joined.
    async fn publish(
        &self,
        video: Option<Arc<dyn LocalMediaTrack>>,
        audio: Option<Arc<dyn LocalMediaTrack>>,
    ) -> Result<(), TransportError>;

    async fn close(&self);
}

/// What the SDK hands back for one join attempt.
pub struct TransportConnection {
    pub session: Arc<dyn TransportSession>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The black-box real-time transport SDK.
#[async_trait]
pub trait TransportSdk: Send + Sync {
    /// Construct the underlying client. Gated on host capabilities; a
    /// failure here is fatal for the page.
    fn init(&self) -> Result<(), TransportError>;

    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<TransportConnection, TransportError>;
}

type TaggedEvent = (u64, TransportEvent);

/// Thin wrapper around the transport SDK.
///
/// Owns the session epoch: each join attempt is tagged with the next epoch,
/// and the single page-lifetime forwarder discards events whose epoch no
/// longer matches, so a superseded session can never mutate the registry.
pub struct TransportAdapter {
    sdk: Arc<dyn TransportSdk>,
    registry: Arc<StdMutex<ParticipantRegistry>>,
    emitter: EventEmitter,
    epoch: Arc<AtomicU64>,
    forward_tx: StdMutex<Option<mpsc::UnboundedSender<TaggedEvent>>>,
    session: StdMutex<Option<Arc<dyn TransportSession>>>,
}

impl TransportAdapter {
    pub fn new(
        sdk: Arc<dyn TransportSdk>,
        registry: Arc<StdMutex<ParticipantRegistry>>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            sdk,
            registry,
            emitter,
            epoch: Arc::new(AtomicU64::new(0)),
            forward_tx: StdMutex::new(None),
            session: StdMutex::new(None),
        }
    }

    /// Construct the underlying client and spawn the event forwarder.
    ///
    /// Called once per page lifetime; subsequent calls are no-ops. The
    /// forwarder stays subscribed across joins rather than being recreated
    /// per join.
    pub fn initialize(&self) -> Result<(), TransportError> {
        let mut slot = self.forward_tx.lock().unwrap();
        if slot.is_some() {
            return Ok(());
        }
        self.sdk.init()?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::forward_loop(
            rx,
            self.epoch.clone(),
            self.registry.clone(),
            self.emitter.clone(),
        ));
        *slot = Some(tx);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.forward_tx.lock().unwrap().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Join the channel, force-leaving any live session first.
    ///
    /// Returns the local participant id and the epoch tagging this session.
    pub async fn join(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<(String, u64), TransportError> {
        let tx = self
            .forward_tx
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::InitFailed("transport not initialized".into()))?;

        let connected = self.session.lock().unwrap().is_some();
        if connected {
            self.leave().await;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let TransportConnection { session, mut events } = self.sdk.connect(credentials).await?;
        let participant_id = session.participant_id();

        // Pump this session's events into the page-lifetime forwarder,
        // tagged with the epoch they belong to.
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if tx.send((epoch, event)).is_err() {
                    break;
                }
            }
        });

        *self.session.lock().unwrap() = Some(session);
        tracing::info!("joined transport channel as {participant_id} (epoch {epoch})");
        Ok((participant_id, epoch))
    }

    pub async fn publish(
        &self,
        video: Option<Arc<dyn LocalMediaTrack>>,
        audio: Option<Arc<dyn LocalMediaTrack>>,
    ) -> Result<(), TransportError> {
        let session = self
            .session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::Other("publish before join".into()))?;
        session.publish(video, audio).await
    }

    /// Disconnect from the channel. No-op when not connected.
    pub async fn leave(&self) {
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            // Bump the epoch first so in-flight events from this session
            // are discarded while the close is in progress.
            self.epoch.fetch_add(1, Ordering::SeqCst);
            session.close().await;
            tracing::info!("left transport channel");
        }
    }

    /// Forced teardown for the unconditional cleanup path: invalidates the
    /// epoch immediately and detaches the close onto the runtime instead of
    /// awaiting it.
    pub fn abandon(&self) {
        let session = self.session.lock().unwrap().take();
        if let Some(session) = session {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { session.close().await });
            }
        }
    }

    async fn forward_loop(
        mut rx: mpsc::UnboundedReceiver<TaggedEvent>,
        epoch: Arc<AtomicU64>,
        registry: Arc<StdMutex<ParticipantRegistry>>,
        emitter: EventEmitter,
    ) {
        while let Some((event_epoch, event)) = rx.recv().await {
            if event_epoch != epoch.load(Ordering::SeqCst) {
                tracing::debug!("discarding stale transport event (epoch {event_epoch}): {event:?}");
                continue;
            }
            match event {
                TransportEvent::ParticipantPublished { uid, kind, track } => {
                    // Audio plays out the moment it arrives; deferring to a
                    // later render pass risks losing the play-out call.
                    if kind == MediaKind::Audio {
                        track.play();
                    }
                    let newly_joined = {
                        let mut registry = registry.lock().unwrap();
                        let newly_joined = registry.get(&uid).is_none();
                        if let Some(replaced) = registry.upsert(&uid, kind, track) {
                            replaced.stop();
                        }
                        newly_joined
                    };
                    if newly_joined {
                        emitter.emit(CallEvent::ParticipantJoined(uid.clone()));
                    }
                    emitter.emit(CallEvent::TrackPublished { uid, kind });
                }
                TransportEvent::ParticipantUnpublished { uid, kind } => {
                    let removed = registry.lock().unwrap().remove(&uid, kind);
                    if let Some(track) = removed {
                        track.stop();
                        emitter.emit(CallEvent::TrackUnpublished { uid, kind });
                    }
                }
                TransportEvent::ParticipantLeft { uid } => {
                    let tracks = registry.lock().unwrap().remove_all(&uid);
                    for track in tracks {
                        track.stop();
                    }
                    emitter.emit(CallEvent::ParticipantLeft(uid));
                }
            }
        }
        tracing::debug!("transport event forwarder ended");
    }
}
