use std::sync::Arc;

use crate::errors::CallError;

/// Lifecycle phase of the consultation call.
///
/// `Failed` is the absorbing error state; it is re-entered into
/// `Connecting` by a new join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Connecting,
    Joined,
    Leaving,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Events emitted by the call core to UI listeners.
#[derive(Debug, Clone)]
pub enum CallEvent {
    PhaseChanged(CallPhase),
    CallFailed(CallError),
    ParticipantJoined(String), // participant uid
    ParticipantLeft(String),
    TrackPublished { uid: String, kind: MediaKind },
    TrackUnpublished { uid: String, kind: MediaKind },
    LocalMediaToggled { kind: MediaKind, enabled: bool },
}

/// Trait for receiving events from the call core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait CallEventListener: Send + Sync {
    fn on_event(&self, event: CallEvent);
}

/// Dispatches call events to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn CallEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub fn emit(&self, event: CallEvent) {
        let listeners = self.listeners.read().unwrap();
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
