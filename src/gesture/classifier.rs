//! Gesture classifier
//!
//! Turns raw press, pan and key input into logical intents. Holds are
//! debounced: a press released before the debounce timer fires is a tap
//! and never becomes a capture-start. Pans commit on distance or speed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Tuning;
use crate::effect::{Effect, Effects, Timer};
use crate::state::InteractionMode;

use super::keys::{Key, KeyAction, KeyBindings};

/// A 2D offset (px) or velocity (px/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Where a drag started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// The orb; dragging it left opens chat
    Orb,
    /// The chat text entry; swiping it right returns to presence
    TextEntry,
}

/// Logical intents produced by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A press outlived the debounce window
    PressStart,
    /// A held press was released
    PressEnd,
    /// A press released inside the debounce window
    Tap,
    /// A press outlived the long-press window
    LongPress,
    /// A drag crossed the commit threshold toward a mode
    SwipeCommit(InteractionMode),
    /// Transcript overlay key
    ToggleTranscript,
    /// Back key; swipe-commit toward presence
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressPhase {
    /// Debounce timer still pending
    Pending,
    /// Debounce fired; press-start was emitted
    Held,
}

/// What started a press; only a pointer release inside the debounce
/// window counts as a tap on the orb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressSource {
    Pointer,
    Key,
}

#[derive(Debug, Clone, Copy)]
struct PressSession {
    token: u64,
    phase: PressPhase,
    source: PressSource,
}

/// One physical drag. A snapped-back drag is dropped on release; a
/// committed one stays until the next drag starts or gestures reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSession {
    pub surface: Surface,
    pub start_point: Vector,
    /// Offset along the commit direction; zero when the drag points elsewhere
    pub last_offset: Vector,
    pub committed: bool,
}

pub struct GestureClassifier {
    debounce: Duration,
    long_press: Duration,
    swipe_distance: f32,
    swipe_velocity: f32,
    bindings: KeyBindings,
    next_token: u64,
    press: Option<PressSession>,
    pan: Option<GestureSession>,
}

impl GestureClassifier {
    pub fn new(tuning: &Tuning) -> Self {
        Self::with_bindings(tuning, KeyBindings::default())
    }

    pub fn with_bindings(tuning: &Tuning, bindings: KeyBindings) -> Self {
        Self {
            debounce: tuning.press_debounce(),
            long_press: tuning.long_press(),
            swipe_distance: tuning.swipe_distance,
            swipe_velocity: tuning.swipe_velocity,
            bindings,
            next_token: 0,
            press: None,
            pan: None,
        }
    }

    /// Action bound to `key`, if any
    pub fn binding(&self, key: &Key) -> Option<KeyAction> {
        self.bindings.action(key)
    }

    pub fn is_pressing(&self) -> bool {
        self.press.is_some()
    }

    /// The drag in progress, if any
    pub fn pan_session(&self) -> Option<&GestureSession> {
        self.pan.as_ref()
    }

    /// Pointer or touch went down on the orb
    pub fn press_start(&mut self, effects: &mut Effects) -> bool {
        self.begin_press(PressSource::Pointer, effects)
    }

    fn begin_press(&mut self, source: PressSource, effects: &mut Effects) -> bool {
        if self.press.is_some() {
            debug!("press already in progress");
            return false;
        }

        self.next_token += 1;
        let token = self.next_token;
        self.press = Some(PressSession {
            token,
            phase: PressPhase::Pending,
            source,
        });

        effects.push(Effect::Schedule {
            timer: Timer::PressDebounce,
            token,
            after: self.debounce,
        });
        effects.push(Effect::Schedule {
            timer: Timer::LongPress,
            token,
            after: self.long_press,
        });
        true
    }

    /// Pointer or touch released. Pending timers become stale.
    pub fn press_end(&mut self) -> Option<Intent> {
        self.release(PressSource::Pointer)
    }

    fn release(&mut self, source: PressSource) -> Option<Intent> {
        if self.press.map(|p| p.source) != Some(source) {
            return None;
        }
        let press = self.press.take()?;
        match (press.phase, source) {
            (PressPhase::Held, _) => Some(Intent::PressEnd),
            (PressPhase::Pending, PressSource::Pointer) => {
                debug!(token = press.token, "press released inside debounce window");
                Some(Intent::Tap)
            }
            (PressPhase::Pending, PressSource::Key) => {
                debug!(token = press.token, "key released inside debounce window");
                None
            }
        }
    }

    /// A timer scheduled by this classifier fired
    pub fn on_timer(&mut self, timer: Timer, token: u64) -> Option<Intent> {
        let press = self.press.as_mut().filter(|p| p.token == token)?;
        match timer {
            Timer::PressDebounce if press.phase == PressPhase::Pending => {
                press.phase = PressPhase::Held;
                Some(Intent::PressStart)
            }
            Timer::LongPress => Some(Intent::LongPress),
            _ => None,
        }
    }

    /// A drag began on `surface`. A press still inside its debounce window
    /// is discarded; a drag is not a hold.
    pub fn pan_start(&mut self, surface: Surface, point: Vector) {
        if matches!(self.press, Some(PressSession { phase: PressPhase::Pending, .. })) {
            debug!("pending press discarded by drag");
            self.press = None;
        }
        self.pan = Some(GestureSession {
            surface,
            start_point: point,
            last_offset: Vector::default(),
            committed: false,
        });
    }

    /// Drag moved. Only motion in the surface's commit direction is tracked.
    pub fn pan(&mut self, offset: Vector) {
        if let Some(session) = self.pan.as_mut().filter(|s| !s.committed) {
            session.last_offset = tracked_offset(session.surface, offset);
        }
    }

    /// Drag released. Commits when the distance or the speed threshold is
    /// crossed; otherwise the drag snaps back with no side effect.
    pub fn pan_end(&mut self, offset: Vector, velocity: Vector) -> Option<Intent> {
        let mut session = self.pan.take()?;
        if session.committed {
            debug!("drag already committed");
            self.pan = Some(session);
            return None;
        }
        if !follows_direction(session.surface, offset) {
            debug!(?offset, "drag ignored");
            return None;
        }
        session.last_offset = tracked_offset(session.surface, offset);

        let (distance, speed, target) = match session.surface {
            Surface::Orb => (-session.last_offset.x, -velocity.x, InteractionMode::Chat),
            Surface::TextEntry => (session.last_offset.x, velocity.x, InteractionMode::Presence),
        };

        if distance > self.swipe_distance || speed > self.swipe_velocity {
            info!(?offset, ?velocity, to = %target, "swipe committed");
            session.committed = true;
            self.pan = Some(session);
            Some(Intent::SwipeCommit(target))
        } else {
            debug!(?offset, ?velocity, "swipe snapped back");
            None
        }
    }

    /// Key pressed. Auto-repeat never starts a new press.
    pub fn key_down(&mut self, key: &Key, repeat: bool, effects: &mut Effects) -> Option<Intent> {
        match self.bindings.action(key)? {
            KeyAction::Hold => {
                if !repeat {
                    self.begin_press(PressSource::Key, effects);
                }
                None
            }
            KeyAction::ToggleTranscript if !repeat => Some(Intent::ToggleTranscript),
            KeyAction::Back if !repeat => Some(Intent::Back),
            _ => None,
        }
    }

    /// Key released. A keystroke shorter than the debounce window is
    /// dropped, never a tap.
    pub fn key_up(&mut self, key: &Key) -> Option<Intent> {
        match self.bindings.action(key)? {
            KeyAction::Hold => self.release(PressSource::Key),
            _ => None,
        }
    }

    /// Forget any gesture in progress
    pub fn reset(&mut self) {
        self.press = None;
        self.pan = None;
    }
}

/// `offset` projected onto the commit axis, or zero off-direction
fn tracked_offset(surface: Surface, offset: Vector) -> Vector {
    if follows_direction(surface, offset) {
        Vector::new(offset.x, 0.0)
    } else {
        Vector::default()
    }
}

/// Horizontal-dominant motion toward the surface's commit side
fn follows_direction(surface: Surface, offset: Vector) -> bool {
    let horizontal = offset.x.abs() >= offset.y.abs();
    match surface {
        Surface::Orb => horizontal && offset.x <= 0.0,
        Surface::TextEntry => horizontal && offset.x >= 0.0,
    }
}
