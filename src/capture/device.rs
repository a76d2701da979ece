//! Speech-to-text device seam
//!
//! The device is a single exclusive resource. Its events arrive as
//! [`CaptureEvent`]s scoped to the session that produced them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Identity of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "capture-{}", self.0)
    }
}

/// Errors reported by the capture device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("no speech capture device is available")]
    DeviceUnavailable,

    #[error("microphone access was denied")]
    PermissionDenied,

    #[error("speech capture failed: {0}")]
    Device(String),
}

/// What the device observed during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureEventKind {
    /// Best-effort transcript so far (replaces, never appends)
    Partial { text: String },
    /// Sole authoritative end of the session
    SessionEnd { text: String },
    /// Failure; always followed by an empty session end
    Error { code: String },
}

/// A device event tagged with its session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub session: SessionId,
    #[serde(flatten)]
    pub kind: CaptureEventKind,
}

impl CaptureEvent {
    pub fn partial(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Partial { text: text.into() },
        }
    }

    pub fn session_end(session: SessionId, text: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::SessionEnd { text: text.into() },
        }
    }

    pub fn error(session: SessionId, code: impl Into<String>) -> Self {
        Self {
            session,
            kind: CaptureEventKind::Error { code: code.into() },
        }
    }
}

/// A continuous speech-to-text device
pub trait CaptureDevice: Send {
    /// Begin listening for `session`
    fn start(&mut self, session: SessionId) -> Result<(), CaptureError>;

    /// Ask the device to finish `session`; its end event follows later
    fn stop(&mut self, session: SessionId);
}

/// Recognizer availability as last reported by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerAvailability {
    /// The platform has no recognizer
    #[default]
    Absent,
    /// The user withheld microphone access
    Denied,
    /// Ready to capture
    Ready,
}

/// Shared view of the renderer's recognizer
#[derive(Debug, Clone, Default)]
pub struct RecognizerHandle {
    inner: Arc<Mutex<RecognizerAvailability>>,
}

impl RecognizerHandle {
    pub fn set(&self, availability: RecognizerAvailability) {
        let mut current = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current != availability {
            info!(from = ?*current, to = ?availability, "recognizer availability changed");
        }
        *current = availability;
    }

    pub fn get(&self) -> RecognizerAvailability {
        match self.inner.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Capture device hosted by the renderer process.
///
/// The renderer runs the recognizer: it follows `CaptureStarted` and
/// `CaptureStopRequested` events and reports back over IPC. This side only
/// decides whether a session may start.
pub struct RemoteDevice {
    recognizer: RecognizerHandle,
}

impl RemoteDevice {
    pub fn new(recognizer: RecognizerHandle) -> Self {
        Self { recognizer }
    }
}

impl CaptureDevice for RemoteDevice {
    fn start(&mut self, session: SessionId) -> Result<(), CaptureError> {
        match self.recognizer.get() {
            RecognizerAvailability::Ready => {
                debug!(%session, "remote recognizer start");
                Ok(())
            }
            RecognizerAvailability::Absent => Err(CaptureError::DeviceUnavailable),
            RecognizerAvailability::Denied => Err(CaptureError::PermissionDenied),
        }
    }

    fn stop(&mut self, session: SessionId) {
        debug!(%session, "remote recognizer stop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_device_follows_availability() {
        let recognizer = RecognizerHandle::default();
        let mut device = RemoteDevice::new(recognizer.clone());

        assert_eq!(device.start(SessionId(1)), Err(CaptureError::DeviceUnavailable));

        recognizer.set(RecognizerAvailability::Denied);
        assert_eq!(device.start(SessionId(2)), Err(CaptureError::PermissionDenied));

        recognizer.set(RecognizerAvailability::Ready);
        assert_eq!(device.start(SessionId(3)), Ok(()));
    }

    #[test]
    fn test_capture_event_wire_shape() {
        let event = CaptureEvent::partial(SessionId(7), "He");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"session":7,"kind":"partial","text":"He"}"#);

        let parsed: CaptureEvent =
            serde_json::from_str(r#"{"session":7,"kind":"session_end","text":"Hello"}"#).unwrap();
        assert_eq!(parsed, CaptureEvent::session_end(SessionId(7), "Hello"));
    }
}
