//! Mode controller
//!
//! Owns the presence/chat mode, the `transitioning` latch, and the
//! capture adapter. Nothing else may start or stop capture.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capture::{CaptureAdapter, CaptureError, CaptureEvent, SessionId, SessionOutcome, StartOutcome};
use crate::effect::{Effect, Effects, Timer};
use crate::events::CompanionEvent;

use super::orb::{Epoch, Orb, OrbState};

/// Voice-first or text-first interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    /// Orb large and centered; capture available, text entry unavailable
    #[default]
    Presence,
    /// Orb minimized; text entry available, capture unavailable
    Chat,
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionMode::Presence => write!(f, "presence"),
            InteractionMode::Chat => write!(f, "chat"),
        }
    }
}

/// Why a capture request did not produce a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("capture is unavailable in {mode} mode")]
    CaptureRefused { mode: InteractionMode },

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub struct ModeController {
    mode: InteractionMode,
    transitioning: bool,
    settle_token: u64,
    settle_delay: Duration,
    capture: CaptureAdapter,
    /// Orb epoch written when the active session took the orb
    capture_epoch: Option<Epoch>,
    event_tx: broadcast::Sender<CompanionEvent>,
}

impl ModeController {
    pub fn new(
        capture: CaptureAdapter,
        settle_delay: Duration,
        event_tx: broadcast::Sender<CompanionEvent>,
    ) -> Self {
        Self {
            mode: InteractionMode::Presence,
            transitioning: false,
            settle_token: 0,
            settle_delay,
            capture,
            capture_epoch: None,
            event_tx,
        }
    }

    /// Get the current mode
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn capture(&self) -> &CaptureAdapter {
        &self.capture
    }

    /// Open a capture session and hand it the orb. Honored only in presence.
    pub fn request_capture(&mut self, orb: &mut Orb) -> Result<SessionId, ModeError> {
        if self.mode != InteractionMode::Presence {
            debug!(mode = %self.mode, "capture refused");
            return Err(ModeError::CaptureRefused { mode: self.mode });
        }
        if let Some(session) = self.capture.session() {
            return Ok(session);
        }

        let epoch = orb.set(OrbState::Listening);
        match self.capture.start() {
            Ok(StartOutcome::Started(session)) | Ok(StartOutcome::AlreadyActive(session)) => {
                self.capture_epoch = Some(epoch);
                Ok(session)
            }
            Err(e) => {
                orb.set(OrbState::Idle);
                Err(e.into())
            }
        }
    }

    /// Ask the active session to finish. The orb is released by the
    /// session end, not here.
    pub fn request_stop_capture(&mut self, orb: &Orb) -> bool {
        if orb.state() != OrbState::Listening {
            debug!(orb = %orb.state(), "stop ignored, not listening");
            return false;
        }
        self.capture.stop()
    }

    /// Route a device event to the adapter and release the orb when a
    /// session ends without a transcript.
    pub fn on_capture_event(&mut self, event: CaptureEvent, orb: &mut Orb) -> Option<SessionOutcome> {
        let outcome = self.capture.on_event(event)?;
        let epoch = self.capture_epoch.take();

        if !matches!(outcome, SessionOutcome::Transcript(_)) {
            if let Some(epoch) = epoch {
                orb.set_if_current(epoch, OrbState::Idle);
            }
        }

        Some(outcome)
    }

    /// Cut the active session short and return the orb to idle
    pub fn abort_capture(&mut self, orb: &mut Orb) -> Option<SessionId> {
        let session = self.capture.abort()?;
        if let Some(epoch) = self.capture_epoch.take() {
            orb.set_if_current(epoch, OrbState::Idle);
        }
        Some(session)
    }

    /// Flip to `target` and latch `transitioning` until the settle timer
    /// fires. No-op when already in `target` or while a flip is settling.
    pub fn commit_mode_switch(
        &mut self,
        target: InteractionMode,
        orb: &mut Orb,
        effects: &mut Effects,
    ) -> bool {
        if target == self.mode {
            debug!(mode = %target, "already in requested mode");
            return false;
        }
        if self.transitioning {
            warn!(mode = %self.mode, requested = %target, "mode switch refused while transitioning");
            return false;
        }

        if target == InteractionMode::Chat {
            self.abort_capture(orb);
        }

        let previous = self.mode;
        self.mode = target;
        self.transitioning = true;
        self.settle_token += 1;

        info!(from = %previous, to = %target, "mode switch committed");
        effects.push(Effect::Schedule {
            timer: Timer::ModeSettle,
            token: self.settle_token,
            after: self.settle_delay,
        });
        let _ = self.event_tx.send(CompanionEvent::ModeChanged {
            mode: target,
            previous,
        });
        true
    }

    /// Settle timer fired
    pub fn on_settled(&mut self, token: u64) -> bool {
        if !self.transitioning || token != self.settle_token {
            debug!(token, current = self.settle_token, "stale settle timer");
            return false;
        }
        self.transitioning = false;
        debug!(mode = %self.mode, "mode settled");
        let _ = self.event_tx.send(CompanionEvent::ModeSettled { mode: self.mode });
        true
    }
}
