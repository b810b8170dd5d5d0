use std::sync::Arc;

use crate::events::MediaKind;
use crate::transport::RemoteMediaTrack;

/// Another call participant and the media they currently publish.
///
/// Track lifetime is owned by the transport layer; the registry only holds
/// handles for play-out and rendering.
#[derive(Clone)]
pub struct RemoteParticipant {
    pub uid: String,
    pub video_track: Option<Arc<dyn RemoteMediaTrack>>,
    pub audio_track: Option<Arc<dyn RemoteMediaTrack>>,
}

impl RemoteParticipant {
    fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            video_track: None,
            audio_track: None,
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_track.is_some()
    }

    fn is_empty(&self) -> bool {
        self.video_track.is_none() && self.audio_track.is_none()
    }
}

/// In-memory registry of remote participants, in arrival order.
///
/// Updated by the transport adapter's event forwarder. Read by the UI.
pub struct ParticipantRegistry {
    participants: Vec<RemoteParticipant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self { participants: Vec::new() }
    }

    pub fn get(&self, uid: &str) -> Option<&RemoteParticipant> {
        self.participants.iter().find(|p| p.uid == uid)
    }

    /// Record a published track, creating the participant on first publish.
    /// Returns the handle that was replaced, if any, so its play-out can be
    /// stopped.
    pub fn upsert(
        &mut self,
        uid: &str,
        kind: MediaKind,
        track: Arc<dyn RemoteMediaTrack>,
    ) -> Option<Arc<dyn RemoteMediaTrack>> {
        let participant = match self.participants.iter_mut().find(|p| p.uid == uid) {
            Some(p) => p,
            None => {
                self.participants.push(RemoteParticipant::new(uid));
                self.participants.last_mut().unwrap()
            }
        };
        match kind {
            MediaKind::Video => participant.video_track.replace(track),
            MediaKind::Audio => participant.audio_track.replace(track),
        }
    }

    /// Drop one published track. The participant disappears from the
    /// registry when their last track is removed.
    pub fn remove(&mut self, uid: &str, kind: MediaKind) -> Option<Arc<dyn RemoteMediaTrack>> {
        let index = self.participants.iter().position(|p| p.uid == uid)?;
        let participant = &mut self.participants[index];
        let removed = match kind {
            MediaKind::Video => participant.video_track.take(),
            MediaKind::Audio => participant.audio_track.take(),
        };
        if participant.is_empty() {
            self.participants.remove(index);
        }
        removed
    }

    /// Drop a participant entirely, returning every track they held.
    pub fn remove_all(&mut self, uid: &str) -> Vec<Arc<dyn RemoteMediaTrack>> {
        let Some(index) = self.participants.iter().position(|p| p.uid == uid) else {
            return Vec::new();
        };
        let participant = self.participants.remove(index);
        participant
            .video_track
            .into_iter()
            .chain(participant.audio_track)
            .collect()
    }

    pub fn list(&self) -> &[RemoteParticipant] {
        &self.participants
    }

    /// The remote feed to show as primary: the first participant that
    /// published video, in arrival order.
    pub fn primary(&self) -> Option<&RemoteParticipant> {
        self.participants.iter().find(|p| p.has_video())
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Empty the registry, returning every held track so play-out can be
    /// stopped.
    pub fn clear(&mut self) -> Vec<Arc<dyn RemoteMediaTrack>> {
        self.participants
            .drain(..)
            .flat_map(|p| p.video_track.into_iter().chain(p.audio_track))
            .collect()
    }
}

impl Default for ParticipantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRemoteTrack;

    fn track(kind: MediaKind) -> Arc<dyn RemoteMediaTrack> {
        Arc::new(FakeRemoteTrack::new(kind))
    }

    #[test]
    fn first_publish_creates_participant() {
        let mut registry = ParticipantRegistry::new();
        registry.upsert("p1", MediaKind::Audio, track(MediaKind::Audio));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("p1").is_some());
        assert!(!registry.get("p1").unwrap().has_video());
    }

    #[test]
    fn upsert_replaces_existing_track() {
        let mut registry = ParticipantRegistry::new();
        assert!(registry.upsert("p1", MediaKind::Video, track(MediaKind::Video)).is_none());
        let replaced = registry.upsert("p1", MediaKind::Video, track(MediaKind::Video));
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removing_last_track_drops_participant() {
        let mut registry = ParticipantRegistry::new();
        registry.upsert("p1", MediaKind::Audio, track(MediaKind::Audio));
        registry.upsert("p1", MediaKind::Video, track(MediaKind::Video));

        assert!(registry.remove("p1", MediaKind::Video).is_some());
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("p1", MediaKind::Audio).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_unknown_participant_is_none() {
        let mut registry = ParticipantRegistry::new();
        assert!(registry.remove("ghost", MediaKind::Audio).is_none());
    }

    #[test]
    fn remove_all_returns_every_track() {
        let mut registry = ParticipantRegistry::new();
        registry.upsert("p1", MediaKind::Audio, track(MediaKind::Audio));
        registry.upsert("p1", MediaKind::Video, track(MediaKind::Video));

        let tracks = registry.remove_all("p1");
        assert_eq!(tracks.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn primary_is_first_video_publisher_in_arrival_order() {
        let mut registry = ParticipantRegistry::new();
        registry.upsert("audio-only", MediaKind::Audio, track(MediaKind::Audio));
        registry.upsert("cam-b", MediaKind::Video, track(MediaKind::Video));
        registry.upsert("cam-c", MediaKind::Video, track(MediaKind::Video));

        assert_eq!(registry.primary().unwrap().uid, "cam-b");
    }

    #[test]
    fn clear_returns_all_tracks() {
        let mut registry = ParticipantRegistry::new();
        registry.upsert("p1", MediaKind::Audio, track(MediaKind::Audio));
        registry.upsert("p2", MediaKind::Video, track(MediaKind::Video));

        let tracks = registry.clear();
        assert_eq!(tracks.len(), 2);
        assert!(registry.is_empty());
    }
}
