//! Capture adapter
//!
//! Wraps the device with session objects. At most one session is active;
//! events for any other session are stale and dropped. The interim
//! transcript lives here and never outlives its session.

use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::CompanionEvent;

use super::device::{CaptureDevice, CaptureError, CaptureEvent, CaptureEventKind, SessionId};

/// Result of asking the adapter to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was opened
    Started(SessionId),
    /// A session was already running; nothing changed
    AlreadyActive(SessionId),
}

/// How a session finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Non-empty trimmed final transcript
    Transcript(String),
    /// Session ended with nothing worth committing
    Empty,
    /// Device reported an error
    Failed(CaptureError),
}

struct ActiveSession {
    id: SessionId,
    started_at: Instant,
    stop_requested: bool,
}

pub struct CaptureAdapter {
    device: Box<dyn CaptureDevice>,
    next_session: u64,
    active: Option<ActiveSession>,
    interim: String,
    event_tx: broadcast::Sender<CompanionEvent>,
}

impl CaptureAdapter {
    pub fn new(device: Box<dyn CaptureDevice>, event_tx: broadcast::Sender<CompanionEvent>) -> Self {
        Self {
            device,
            next_session: 0,
            active: None,
            interim: String::new(),
            event_tx,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Current interim transcript (empty outside a session)
    pub fn interim(&self) -> &str {
        &self.interim
    }

    /// Open a session. Idempotent while one is active.
    pub fn start(&mut self) -> Result<StartOutcome, CaptureError> {
        if let Some(active) = &self.active {
            debug!(session = %active.id, "capture already active");
            return Ok(StartOutcome::AlreadyActive(active.id));
        }

        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.interim.clear();

        self.device.start(id).map_err(|e| {
            warn!(session = %id, error = %e, "capture device refused to start");
            e
        })?;

        info!(session = %id, "capture session started");
        self.active = Some(ActiveSession {
            id,
            started_at: Instant::now(),
            stop_requested: false,
        });
        let _ = self.event_tx.send(CompanionEvent::CaptureStarted { session: id });

        Ok(StartOutcome::Started(id))
    }

    /// Ask the device to finish the active session. Returns false if there
    /// was nothing to stop or stop was already requested.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if active.stop_requested {
            debug!(session = %active.id, "stop already requested");
            return false;
        }

        active.stop_requested = true;
        let id = active.id;
        self.device.stop(id);
        info!(session = %id, "capture stop requested");
        let _ = self.event_tx.send(CompanionEvent::CaptureStopRequested { session: id });
        true
    }

    /// Close the active session now and discard whatever it still sends
    pub fn abort(&mut self) -> Option<SessionId> {
        let active = self.active.take()?;
        self.device.stop(active.id);
        self.interim.clear();
        info!(session = %active.id, "capture session aborted");
        let _ = self.event_tx.send(CompanionEvent::CaptureAborted { session: active.id });
        Some(active.id)
    }

    /// Feed one device event. Returns the outcome once the session is over.
    pub fn on_event(&mut self, event: CaptureEvent) -> Option<SessionOutcome> {
        if self.session() != Some(event.session) {
            debug!(session = %event.session, "stale capture event dropped");
            return None;
        }

        match event.kind {
            CaptureEventKind::Partial { text } => {
                self.interim = text;
                let _ = self.event_tx.send(CompanionEvent::InterimTranscript {
                    session: event.session,
                    text: self.interim.clone(),
                });
                None
            }
            CaptureEventKind::SessionEnd { text } => {
                self.finish();
                let text = text.trim();
                if text.is_empty() {
                    debug!(session = %event.session, "session ended without speech");
                    Some(SessionOutcome::Empty)
                } else {
                    Some(SessionOutcome::Transcript(text.to_string()))
                }
            }
            CaptureEventKind::Error { code } => {
                // The trailing empty session end finds no active session.
                warn!(session = %event.session, %code, "capture device error");
                self.finish();
                let error = match code.as_str() {
                    "not-allowed" | "service-not-allowed" => CaptureError::PermissionDenied,
                    "audio-capture" => CaptureError::DeviceUnavailable,
                    _ => CaptureError::Device(code),
                };
                Some(SessionOutcome::Failed(error))
            }
        }
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            let duration_ms = active.started_at.elapsed().as_millis() as u64;
            self.interim.clear();
            info!(session = %active.id, duration_ms, "capture session ended");
            let _ = self.event_tx.send(CompanionEvent::CaptureEnded {
                session: active.id,
                duration_ms,
            });
        }
    }
}
