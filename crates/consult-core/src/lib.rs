//! Consultation call core.
//!
//! SDK-agnostic session manager for live patient–clinician video visits:
//! credential negotiation, local capture lifetime, remote participant
//! tracking and guaranteed resource release on every exit path.
//! Consumed by platform shells through [`CallManager`] and
//! [`events::CallEventListener`].

pub mod call;
pub mod errors;
pub mod events;
pub mod logging;
pub mod media;
pub mod participants;
pub mod session;
pub mod settings;
pub mod transport;
pub mod visit;

#[cfg(test)]
pub(crate) mod testutil;

pub use call::CallManager;
pub use errors::{CallError, ErrorKind, MediaError, SessionError, TransportError};
pub use events::{CallEvent, CallEventListener, CallPhase, MediaKind};
pub use media::{CaptureOptions, LocalMediaTrack, MediaDevices};
pub use participants::RemoteParticipant;
pub use session::{SessionCredentials, SessionProvider, SessionService};
pub use settings::{Settings, SettingsStore};
pub use transport::{RemoteMediaTrack, TransportSdk, TransportSession};
pub use visit::{VisitContext, VisitError, VisitService};
