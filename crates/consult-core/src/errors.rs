use thiserror::Error;

/// Failures raised by the camera/microphone capture layer.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("camera/microphone access denied")]
    PermissionDenied,
    #[error("no capture device found")]
    NotFound,
    #[error("capture device is in use by another process")]
    Busy,
    #[error("device error: {0}")]
    Other(String),
}

/// Failures raised by the real-time transport layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("transport init failed: {0}")]
    InitFailed(String),
    #[error("transport unreachable: {0}")]
    Unreachable(String),
    #[error("join rejected: {0}")]
    JoinRejected(String),
    #[error("publish rejected: {0}")]
    PublishRejected(String),
    #[error("transport error: {0}")]
    Other(String),
}

/// Failures raised by the session credential service.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("no session available: {0}")]
    Unavailable(String),
    #[error("session service unreachable: {0}")]
    Unreachable(String),
}

/// Fixed failure taxonomy shown to the user.
///
/// Every raw failure from the device, credential or transport layers is
/// folded into one of these kinds before it reaches the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceNotFound,
    DeviceBusy,
    SessionUnavailable,
    JoinFailed,
    PublishFailed,
    TransportUnreachable,
    TransportInitFailed,
    Unknown,
}

impl ErrorKind {
    /// Human-readable remedy for the user.
    pub fn remedy(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Allow camera and microphone access, then try again.",
            Self::DeviceNotFound => "No camera or microphone was found. Check your devices.",
            Self::DeviceBusy => "Close other apps using your camera or microphone.",
            Self::SessionUnavailable => "Your session could not be started. Refresh and try again.",
            Self::JoinFailed | Self::PublishFailed => "There was a connection issue. Try again.",
            Self::TransportUnreachable => "Check your internet connection.",
            Self::TransportInitFailed => "Something went wrong loading the call. Reload the page.",
            Self::Unknown => "An unexpected error occurred. Try again.",
        }
    }

    /// Only transport initialization failures are unrecoverable within a
    /// page's lifetime.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::TransportInitFailed)
    }
}

/// The single classified error value surfaced for the current call attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CallError {
    pub fn remedy(&self) -> &'static str {
        self.kind.remedy()
    }
}

impl From<MediaError> for CallError {
    fn from(e: MediaError) -> Self {
        let kind = match &e {
            MediaError::PermissionDenied => ErrorKind::PermissionDenied,
            MediaError::NotFound => ErrorKind::DeviceNotFound,
            MediaError::Busy => ErrorKind::DeviceBusy,
            MediaError::Other(_) => ErrorKind::Unknown,
        };
        Self { kind, message: e.to_string() }
    }
}

impl From<TransportError> for CallError {
    fn from(e: TransportError) -> Self {
        let kind = match &e {
            TransportError::InitFailed(_) => ErrorKind::TransportInitFailed,
            TransportError::Unreachable(_) => ErrorKind::TransportUnreachable,
            TransportError::JoinRejected(_) => ErrorKind::JoinFailed,
            TransportError::PublishRejected(_) => ErrorKind::PublishFailed,
            TransportError::Other(_) => ErrorKind::Unknown,
        };
        Self { kind, message: e.to_string() }
    }
}

impl From<SessionError> for CallError {
    fn from(e: SessionError) -> Self {
        let kind = match &e {
            SessionError::Unavailable(_) => ErrorKind::SessionUnavailable,
            SessionError::Unreachable(_) => ErrorKind::TransportUnreachable,
        };
        Self { kind, message: e.to_string() }
    }
}
