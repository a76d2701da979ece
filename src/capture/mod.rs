//! Capture module for continuous speech-to-text
//!
//! Exposes the device seam and the session-scoped adapter that turns
//! device events into committed transcripts.

mod adapter;
mod device;

pub use adapter::{CaptureAdapter, SessionOutcome, StartOutcome};
pub use device::{
    CaptureDevice, CaptureError, CaptureEvent, CaptureEventKind, RecognizerAvailability,
    RecognizerHandle, RemoteDevice, SessionId,
};
