//! Companion core
//!
//! Single owner of every piece of interaction state. Inputs arrive one at
//! a time from the runtime; handling an input mutates state, emits events,
//! and returns the effects the runtime must perform.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::capture::{CaptureAdapter, CaptureDevice, CaptureError, CaptureEvent, SessionOutcome};
use crate::config::Tuning;
use crate::conversation::{BackendError, ExchangeReply, Message, Orchestrator, RequestId, SubmitOutcome};
use crate::effect::{Effect, Effects, Timer};
use crate::events::{CompanionEvent, Notice, NoticeKind};
use crate::gesture::{GestureClassifier, Intent, Key, KeyAction, Surface, Vector};
use crate::state::{InteractionMode, ModeController, ModeError, Orb, OrbState};

/// Raw input from the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserInput {
    /// Pointer or touch down on the orb
    PressStart,
    /// Pointer or touch released (or left the orb)
    PressEnd,
    PanStart {
        surface: Surface,
        point: Vector,
    },
    Pan {
        offset: Vector,
        velocity: Vector,
    },
    PanEnd {
        offset: Vector,
        velocity: Vector,
    },
    KeyDown {
        key: Key,
        #[serde(default)]
        repeat: bool,
    },
    KeyUp {
        key: Key,
    },
    /// Text typed into the chat surface
    SubmitText {
        text: String,
    },
    /// User closed the current notice
    DismissNotice,
    /// User navigated away from the companion screen
    Leave,
}

/// Everything the core reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    User(UserInput),
    Capture(CaptureEvent),
    TimerFired {
        timer: Timer,
        token: u64,
    },
    ExchangeCompleted {
        request: RequestId,
        result: Result<ExchangeReply, BackendError>,
    },
}

impl From<UserInput> for Input {
    fn from(input: UserInput) -> Self {
        Input::User(input)
    }
}

impl From<CaptureEvent> for Input {
    fn from(event: CaptureEvent) -> Self {
        Input::Capture(event)
    }
}

pub struct Companion {
    tuning: Tuning,
    orb: Orb,
    mode: ModeController,
    gestures: GestureClassifier,
    conversation: Orchestrator,
    transcript_visible: bool,
    notice: Option<Notice>,
    next_notice: u64,
    event_tx: broadcast::Sender<CompanionEvent>,
}

impl Companion {
    pub fn new(
        tuning: Tuning,
        device: Box<dyn CaptureDevice>,
        event_tx: broadcast::Sender<CompanionEvent>,
    ) -> Self {
        let capture = CaptureAdapter::new(device, event_tx.clone());
        Self {
            orb: Orb::new(event_tx.clone()),
            mode: ModeController::new(capture, tuning.mode_settle(), event_tx.clone()),
            gestures: GestureClassifier::new(&tuning),
            conversation: Orchestrator::new(&tuning, event_tx.clone()),
            tuning,
            transcript_visible: false,
            notice: None,
            next_notice: 0,
            event_tx,
        }
    }

    pub fn orb_state(&self) -> OrbState {
        self.orb.state()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode.mode()
    }

    pub fn is_transitioning(&self) -> bool {
        self.mode.is_transitioning()
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.history()
    }

    pub fn interim_transcript(&self) -> &str {
        self.mode.capture().interim()
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.conversation.subtitle()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn transcript_visible(&self) -> bool {
        self.transcript_visible
    }

    /// Handle one input to completion
    pub fn handle(&mut self, input: Input) -> Effects {
        let mut effects = Effects::new();
        match input {
            Input::User(input) => self.handle_user(input, &mut effects),
            Input::Capture(event) => self.handle_capture(event, &mut effects),
            Input::TimerFired { timer, token } => self.handle_timer(timer, token, &mut effects),
            Input::ExchangeCompleted { request, result } => {
                let failures =
                    self.conversation
                        .on_exchange_completed(request, result, &mut self.orb, &mut effects);
                for e in failures {
                    self.notify_backend(e, &mut effects);
                }
            }
        }
        effects
    }

    fn handle_user(&mut self, input: UserInput, effects: &mut Effects) {
        match input {
            UserInput::PressStart => {
                if self.ignore_while_transitioning("press") {
                    return;
                }
                self.gestures.press_start(effects);
            }
            UserInput::PressEnd => {
                if let Some(intent) = self.gestures.press_end() {
                    self.on_intent(intent, effects);
                }
            }
            UserInput::PanStart { surface, point } => {
                if self.ignore_while_transitioning("pan") {
                    return;
                }
                self.gestures.pan_start(surface, point);
            }
            UserInput::Pan { offset, .. } => self.gestures.pan(offset),
            UserInput::PanEnd { offset, velocity } => {
                if let Some(intent) = self.gestures.pan_end(offset, velocity) {
                    self.on_intent(intent, effects);
                }
            }
            UserInput::KeyDown { key, repeat } => {
                if self.gestures.binding(&key) == Some(KeyAction::Hold)
                    && self.ignore_while_transitioning("key press")
                {
                    return;
                }
                if let Some(intent) = self.gestures.key_down(&key, repeat, effects) {
                    self.on_intent(intent, effects);
                }
            }
            UserInput::KeyUp { key } => {
                if let Some(intent) = self.gestures.key_up(&key) {
                    self.on_intent(intent, effects);
                }
            }
            UserInput::SubmitText { text } => {
                if self.mode.mode() != InteractionMode::Chat {
                    warn!(mode = %self.mode.mode(), "text submission refused outside chat");
                    return;
                }
                self.conversation.submit_user_text(&text, &mut self.orb, effects);
            }
            UserInput::DismissNotice => self.clear_notice(None),
            UserInput::Leave => self.leave(),
        }
    }

    fn on_intent(&mut self, intent: Intent, effects: &mut Effects) {
        debug!(?intent, "gesture intent");
        match intent {
            Intent::PressStart => {
                if self.ignore_while_transitioning("capture start") {
                    return;
                }
                match self.mode.request_capture(&mut self.orb) {
                    Ok(session) => debug!(%session, "capture owns the orb"),
                    Err(ModeError::CaptureRefused { mode }) => debug!(%mode, "hold ignored"),
                    Err(ModeError::Capture(e)) => self.notify_capture(e, effects),
                }
            }
            Intent::PressEnd => {
                self.mode.request_stop_capture(&self.orb);
            }
            Intent::Tap => {
                if self.mode.mode() == InteractionMode::Chat {
                    self.switch_mode(InteractionMode::Presence, effects);
                }
            }
            Intent::LongPress => self.set_transcript_visible(true),
            Intent::SwipeCommit(target) => self.switch_mode(target, effects),
            Intent::ToggleTranscript => self.set_transcript_visible(!self.transcript_visible),
            Intent::Back => {
                self.set_transcript_visible(false);
                self.switch_mode(InteractionMode::Presence, effects);
            }
        }
    }

    fn handle_capture(&mut self, event: CaptureEvent, effects: &mut Effects) {
        match self.mode.on_capture_event(event, &mut self.orb) {
            Some(SessionOutcome::Transcript(text)) => {
                if let SubmitOutcome::Accepted(request) =
                    self.conversation.submit_user_text(&text, &mut self.orb, effects)
                {
                    debug!(%request, "transcript committed");
                }
            }
            Some(SessionOutcome::Failed(e)) => self.notify_capture(e, effects),
            Some(SessionOutcome::Empty) | None => {}
        }
    }

    fn handle_timer(&mut self, timer: Timer, token: u64, effects: &mut Effects) {
        match timer {
            Timer::PressDebounce | Timer::LongPress => {
                if let Some(intent) = self.gestures.on_timer(timer, token) {
                    self.on_intent(intent, effects);
                }
            }
            Timer::ModeSettle => {
                self.mode.on_settled(token);
            }
            Timer::SpeakingDwell => {
                self.conversation.on_dwell_elapsed(token, &mut self.orb, effects)
            }
            Timer::SubtitleFade => self.conversation.on_subtitle_fade(token),
            Timer::NoticeExpiry => self.clear_notice(Some(token)),
        }
    }

    fn switch_mode(&mut self, target: InteractionMode, effects: &mut Effects) {
        if self.mode.commit_mode_switch(target, &mut self.orb, effects) {
            self.gestures.reset();
        }
    }

    fn leave(&mut self) {
        info!("leaving companion screen");
        self.mode.abort_capture(&mut self.orb);
        self.gestures.reset();
        if self.orb.state() != OrbState::Idle {
            self.orb.set(OrbState::Idle);
        }
        self.conversation.clear_subtitle();
        self.set_transcript_visible(false);
    }

    fn ignore_while_transitioning(&self, what: &str) -> bool {
        if self.mode.is_transitioning() {
            debug!(what, "ignored while mode is transitioning");
            return true;
        }
        false
    }

    fn set_transcript_visible(&mut self, visible: bool) {
        if self.transcript_visible != visible {
            self.transcript_visible = visible;
            let _ = self
                .event_tx
                .send(CompanionEvent::TranscriptVisibility { visible });
        }
    }

    fn notify_capture(&mut self, error: CaptureError, effects: &mut Effects) {
        let kind = match error {
            CaptureError::DeviceUnavailable => NoticeKind::DeviceUnavailable,
            CaptureError::PermissionDenied => NoticeKind::PermissionDenied,
            CaptureError::Device(_) => NoticeKind::CaptureFailed,
        };
        self.notify(kind, error.to_string(), effects);
    }

    fn notify_backend(&mut self, error: BackendError, effects: &mut Effects) {
        let kind = if error.is_auth() {
            NoticeKind::Auth
        } else {
            NoticeKind::Backend
        };
        self.notify(kind, error.to_string(), effects);
    }

    fn notify(&mut self, kind: NoticeKind, message: String, effects: &mut Effects) {
        self.next_notice += 1;
        let notice = Notice {
            id: self.next_notice,
            kind,
            message,
        };
        warn!(id = notice.id, ?kind, message = %notice.message, "notice raised");

        effects.push(Effect::Schedule {
            timer: Timer::NoticeExpiry,
            token: notice.id,
            after: self.tuning.notice_ttl(),
        });
        self.notice = Some(notice.clone());
        let _ = self.event_tx.send(CompanionEvent::Notice(notice));
    }

    /// Clear the current notice; with `id`, only if it is still that notice
    fn clear_notice(&mut self, id: Option<u64>) {
        let matches = match (&self.notice, id) {
            (Some(current), Some(id)) => current.id == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return;
        }
        if let Some(notice) = self.notice.take() {
            debug!(id = notice.id, "notice cleared");
            let _ = self.event_tx.send(CompanionEvent::NoticeCleared { id: notice.id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SessionId;
    use crate::test_utils::{drain_events, orb_path, ScriptedDevice};

    struct Fixture {
        companion: Companion,
        device: ScriptedDevice,
        rx: broadcast::Receiver<CompanionEvent>,
    }

    fn create_fixture() -> Fixture {
        let (tx, rx) = broadcast::channel(256);
        let device = ScriptedDevice::default();
        Fixture {
            companion: Companion::new(Tuning::default(), Box::new(device.clone()), tx),
            device,
            rx,
        }
    }

    fn user(f: &mut Fixture, input: UserInput) -> Effects {
        f.companion.handle(Input::User(input))
    }

    fn token_for(effects: &Effects, timer: Timer) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Schedule { timer: t, token, .. } if *t == timer => Some(*token),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no {} scheduled in {:?}", timer, effects))
    }

    fn fire(f: &mut Fixture, effects: &Effects, timer: Timer) -> Effects {
        let token = token_for(effects, timer);
        f.companion.handle(Input::TimerFired { timer, token })
    }

    fn hold(f: &mut Fixture) -> SessionId {
        let effects = user(f, UserInput::PressStart);
        fire(f, &effects, Timer::PressDebounce);
        f.companion.mode.capture().session().unwrap()
    }

    fn drag(f: &mut Fixture, surface: Surface, dx: f32, vx: f32) -> Effects {
        user(
            f,
            UserInput::PanStart {
                surface,
                point: Vector::new(180.0, 420.0),
            },
        );
        user(
            f,
            UserInput::Pan {
                offset: Vector::new(dx, 0.0),
                velocity: Vector::new(vx, 0.0),
            },
        );
        user(
            f,
            UserInput::PanEnd {
                offset: Vector::new(dx, 0.0),
                velocity: Vector::new(vx, 0.0),
            },
        )
    }

    fn enter_chat(f: &mut Fixture) {
        let effects = drag(f, Surface::Orb, -120.0, -10.0);
        fire(f, &effects, Timer::ModeSettle);
        assert_eq!(f.companion.mode(), InteractionMode::Chat);
        assert!(!f.companion.is_transitioning());
    }

    #[test]
    fn test_hold_speak_release_commits_transcript() {
        let mut f = create_fixture();

        let session = hold(&mut f);
        assert_eq!(f.companion.orb_state(), OrbState::Listening);

        f.companion.handle(CaptureEvent::partial(session, "He").into());
        f.companion.handle(CaptureEvent::partial(session, "Hello").into());
        assert_eq!(f.companion.interim_transcript(), "Hello");

        user(&mut f, UserInput::PressEnd);
        assert_eq!(f.device.stops(), vec![session]);
        assert_eq!(f.companion.orb_state(), OrbState::Listening);

        let effects = f
            .companion
            .handle(CaptureEvent::session_end(session, "Hello").into());

        assert_eq!(f.companion.history(), &[Message::user("Hello")]);
        assert_eq!(f.companion.interim_transcript(), "");
        assert_eq!(f.companion.orb_state(), OrbState::Thinking);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Exchange { input, history, .. }] if input == "Hello" && history.is_empty()
        ));
    }

    #[test]
    fn test_tap_never_listens() {
        let mut f = create_fixture();

        let effects = user(&mut f, UserInput::PressStart);
        user(&mut f, UserInput::PressEnd);
        fire(&mut f, &effects, Timer::PressDebounce);
        fire(&mut f, &effects, Timer::LongPress);

        assert!(f.device.starts().is_empty());
        assert!(!orb_path(&mut f.rx).contains(&OrbState::Listening));
        assert!(!f.companion.transcript_visible());
    }

    #[test]
    fn test_whitespace_transcript_returns_to_idle() {
        let mut f = create_fixture();
        let session = hold(&mut f);
        user(&mut f, UserInput::PressEnd);

        let effects = f
            .companion
            .handle(CaptureEvent::session_end(session, "   ").into());

        assert!(effects.is_empty());
        assert!(f.companion.history().is_empty());
        assert_eq!(orb_path(&mut f.rx), vec![OrbState::Listening, OrbState::Idle]);
    }

    #[test]
    fn test_drag_thresholds_decide_mode() {
        let mut f = create_fixture();

        drag(&mut f, Surface::Orb, -40.0, -50.0);
        assert_eq!(f.companion.mode(), InteractionMode::Presence);

        drag(&mut f, Surface::Orb, -120.0, -50.0);
        assert_eq!(f.companion.mode(), InteractionMode::Chat);
    }

    #[test]
    fn test_transitioning_ignores_new_press_and_pan() {
        let mut f = create_fixture();
        let effects = drag(&mut f, Surface::Orb, -120.0, 0.0);
        assert!(f.companion.is_transitioning());

        assert!(user(&mut f, UserInput::PressStart).is_empty());
        assert!(user(
            &mut f,
            UserInput::KeyDown {
                key: Key::Space,
                repeat: false
            }
        )
        .is_empty());
        drag(&mut f, Surface::TextEntry, 150.0, 0.0);
        assert_eq!(f.companion.mode(), InteractionMode::Chat);

        fire(&mut f, &effects, Timer::ModeSettle);
        assert!(!f.companion.is_transitioning());
    }

    #[test]
    fn test_backend_error_leaves_only_user_message() {
        let mut f = create_fixture();
        enter_chat(&mut f);
        drain_events(&mut f.rx);

        let effects = user(&mut f, UserInput::SubmitText { text: "Hi".into() });
        let request = match effects.as_slice() {
            [Effect::Exchange { request, .. }] => *request,
            other => panic!("unexpected {:?}", other),
        };
        let effects = f.companion.handle(Input::ExchangeCompleted {
            request,
            result: Err(BackendError::Network("connection reset".into())),
        });

        assert_eq!(f.companion.history(), &[Message::user("Hi")]);
        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        let notice = f.companion.notice().cloned().unwrap();
        assert_eq!(notice.kind, NoticeKind::Backend);
        assert_eq!(token_for(&effects, Timer::NoticeExpiry), notice.id);

        let events = drain_events(&mut f.rx);
        assert!(events.contains(&CompanionEvent::Notice(notice.clone())));
        let orb: Vec<OrbState> = events
            .iter()
            .filter_map(|e| match e {
                CompanionEvent::OrbChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect();
        assert_eq!(orb, vec![OrbState::Thinking, OrbState::Idle]);

        // transient: expires by itself
        fire(&mut f, &effects, Timer::NoticeExpiry);
        assert!(f.companion.notice().is_none());
    }

    #[test]
    fn test_auth_failure_raises_auth_notice() {
        let mut f = create_fixture();
        enter_chat(&mut f);
        let effects = user(&mut f, UserInput::SubmitText { text: "Hi".into() });
        let request = match effects.as_slice() {
            [Effect::Exchange { request, .. }] => *request,
            other => panic!("unexpected {:?}", other),
        };

        f.companion.handle(Input::ExchangeCompleted {
            request,
            result: Err(BackendError::Auth("401 Unauthorized".into())),
        });

        assert_eq!(f.companion.notice().map(|n| n.kind), Some(NoticeKind::Auth));
        user(&mut f, UserInput::DismissNotice);
        assert!(f.companion.notice().is_none());
    }

    #[test]
    fn test_text_refused_in_presence() {
        let mut f = create_fixture();

        let effects = user(&mut f, UserInput::SubmitText { text: "Hi".into() });

        assert!(effects.is_empty());
        assert!(f.companion.history().is_empty());
    }

    #[test]
    fn test_empty_chat_text_is_silent() {
        let mut f = create_fixture();
        enter_chat(&mut f);
        drain_events(&mut f.rx);

        let effects = user(&mut f, UserInput::SubmitText { text: "   ".into() });

        assert!(effects.is_empty());
        assert!(f.companion.notice().is_none());
        assert!(drain_events(&mut f.rx).is_empty());
    }

    #[test]
    fn test_hold_in_chat_is_refused_and_tap_returns_to_presence() {
        let mut f = create_fixture();
        enter_chat(&mut f);

        let effects = user(&mut f, UserInput::PressStart);
        fire(&mut f, &effects, Timer::PressDebounce);
        assert!(f.device.starts().is_empty());
        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        user(&mut f, UserInput::PressEnd);
        assert_eq!(f.companion.mode(), InteractionMode::Chat);

        user(&mut f, UserInput::PressStart);
        user(&mut f, UserInput::PressEnd);
        assert_eq!(f.companion.mode(), InteractionMode::Presence);
    }

    #[test]
    fn test_typing_space_in_chat_keeps_chat() {
        let mut f = create_fixture();
        enter_chat(&mut f);
        drain_events(&mut f.rx);

        let effects = user(
            &mut f,
            UserInput::KeyDown {
                key: Key::Space,
                repeat: false,
            },
        );
        user(&mut f, UserInput::KeyUp { key: Key::Space });
        fire(&mut f, &effects, Timer::PressDebounce);

        assert_eq!(f.companion.mode(), InteractionMode::Chat);
        assert!(!drain_events(&mut f.rx)
            .iter()
            .any(|e| matches!(e, CompanionEvent::ModeChanged { .. })));
        assert!(f.device.starts().is_empty());
    }

    #[test]
    fn test_quick_keystroke_in_presence_never_listens() {
        let mut f = create_fixture();

        let effects = user(
            &mut f,
            UserInput::KeyDown {
                key: Key::Space,
                repeat: false,
            },
        );
        user(&mut f, UserInput::KeyUp { key: Key::Space });
        fire(&mut f, &effects, Timer::PressDebounce);

        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        assert!(f.device.starts().is_empty());
    }

    #[test]
    fn test_escape_closes_overlay_and_returns_to_presence() {
        let mut f = create_fixture();
        enter_chat(&mut f);
        user(
            &mut f,
            UserInput::KeyDown {
                key: Key::KeyT,
                repeat: false,
            },
        );
        assert!(f.companion.transcript_visible());

        let effects = user(
            &mut f,
            UserInput::KeyDown {
                key: Key::Escape,
                repeat: false,
            },
        );
        assert!(!f.companion.transcript_visible());
        assert_eq!(f.companion.mode(), InteractionMode::Presence);
        fire(&mut f, &effects, Timer::ModeSettle);
        drain_events(&mut f.rx);

        // already in presence: nothing observable changes
        let effects = user(
            &mut f,
            UserInput::KeyDown {
                key: Key::Escape,
                repeat: false,
            },
        );
        assert!(effects.is_empty());
        assert!(drain_events(&mut f.rx).is_empty());
    }

    #[test]
    fn test_swipe_right_from_text_entry() {
        let mut f = create_fixture();
        enter_chat(&mut f);

        drag(&mut f, Surface::TextEntry, 100.0, 0.0);

        assert_eq!(f.companion.mode(), InteractionMode::Presence);
    }

    #[test]
    fn test_long_press_opens_transcript() {
        let mut f = create_fixture();
        let effects = user(&mut f, UserInput::PressStart);
        fire(&mut f, &effects, Timer::PressDebounce);

        fire(&mut f, &effects, Timer::LongPress);

        assert!(f.companion.transcript_visible());
    }

    #[test]
    fn test_permission_denied_notice_and_idle() {
        let mut f = create_fixture();
        f.device.fail_next_start(CaptureError::PermissionDenied);

        let effects = user(&mut f, UserInput::PressStart);
        let effects = fire(&mut f, &effects, Timer::PressDebounce);

        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        assert_eq!(
            f.companion.notice().map(|n| n.kind),
            Some(NoticeKind::PermissionDenied)
        );
        token_for(&effects, Timer::NoticeExpiry);
        // chat still works
        enter_chat(&mut f);
        assert_eq!(
            user(&mut f, UserInput::SubmitText { text: "Hi".into() }).len(),
            1
        );
    }

    #[test]
    fn test_capture_error_mid_session() {
        let mut f = create_fixture();
        let session = hold(&mut f);

        f.companion.handle(CaptureEvent::error(session, "audio-capture").into());
        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        assert_eq!(
            f.companion.notice().map(|n| n.kind),
            Some(NoticeKind::DeviceUnavailable)
        );

        // the implicit trailing end changes nothing
        let effects = f.companion.handle(CaptureEvent::session_end(session, "").into());
        assert!(effects.is_empty());
        assert_eq!(f.companion.orb_state(), OrbState::Idle);
    }

    #[test]
    fn test_swipe_to_chat_mid_capture() {
        let mut f = create_fixture();
        let session = hold(&mut f);

        drag(&mut f, Surface::Orb, -200.0, -900.0);

        assert_eq!(f.companion.mode(), InteractionMode::Chat);
        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        f.companion
            .handle(CaptureEvent::session_end(session, "Hello").into());
        assert!(f.companion.history().is_empty());
        // the finger lifting afterwards is harmless
        assert!(user(&mut f, UserInput::PressEnd).is_empty());
    }

    #[test]
    fn test_reply_after_new_capture_keeps_listening() {
        let mut f = create_fixture();
        let session = hold(&mut f);
        user(&mut f, UserInput::PressEnd);
        let effects = f
            .companion
            .handle(CaptureEvent::session_end(session, "Hello").into());
        let request = match effects.as_slice() {
            [Effect::Exchange { request, .. }] => *request,
            other => panic!("unexpected {:?}", other),
        };

        // user starts speaking again before the reply lands
        hold(&mut f);
        f.companion.handle(Input::ExchangeCompleted {
            request,
            result: Ok(ExchangeReply::text("Hi, I am NEX.")),
        });

        assert_eq!(f.companion.orb_state(), OrbState::Listening);
        assert_eq!(f.companion.history().len(), 2);
    }

    #[test]
    fn test_leave_mid_capture_returns_to_idle() {
        let mut f = create_fixture();
        let session = hold(&mut f);

        user(&mut f, UserInput::Leave);

        assert_eq!(f.companion.orb_state(), OrbState::Idle);
        assert_eq!(f.device.stops(), vec![session]);
        assert!(user(&mut f, UserInput::PressEnd).is_empty());
    }

    #[test]
    fn test_user_input_wire_format() {
        let input: UserInput = serde_json::from_str(
            r#"{"type":"pan_end","offset":{"x":-120.0,"y":0.0},"velocity":{"x":-30.0,"y":0.0}}"#,
        )
        .unwrap();
        assert_eq!(
            input,
            UserInput::PanEnd {
                offset: Vector::new(-120.0, 0.0),
                velocity: Vector::new(-30.0, 0.0),
            }
        );

        let input: UserInput = serde_json::from_str(r#"{"type":"key_down","key":"Space"}"#).unwrap();
        assert_eq!(
            input,
            UserInput::KeyDown {
                key: Key::Space,
                repeat: false
            }
        );
    }
}
