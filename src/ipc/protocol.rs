//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::capture::{CaptureEvent, RecognizerAvailability};
use crate::companion::UserInput;
use crate::events::CompanionEvent;
use crate::state::{InteractionMode, OrbState};

/// Requests from the renderer to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request the current companion status
    GetStatus,

    /// Subscribe to companion events
    Subscribe,

    /// Forward a raw pointer, key or text input
    Input { input: UserInput },

    /// Forward a recognizer event for a capture session
    Capture { event: CaptureEvent },

    /// Report whether the recognizer can be used
    Recognizer {
        availability: RecognizerAvailability,
    },
}

/// Responses from the daemon to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current companion status
    Status(CompanionStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Input queued for the companion
    Accepted,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: CompanionEvent },
}

/// Companion status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionStatus {
    /// Daemon version
    pub version: String,

    pub orb: OrbState,

    pub mode: InteractionMode,

    /// Mode transition still settling
    pub transitioning: bool,

    /// Messages in the conversation history
    pub messages: usize,

    pub recognizer: RecognizerAvailability,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for CompanionStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            orb: OrbState::default(),
            mode: InteractionMode::default(),
            transitioning: false,
            messages: 0,
            recognizer: RecognizerAvailability::default(),
            uptime_secs: 0,
        }
    }
}

impl CompanionStatus {
    /// Fold one companion event into the snapshot
    pub fn apply_event(&mut self, event: &CompanionEvent) {
        match event {
            CompanionEvent::OrbChanged { to, .. } => self.orb = *to,
            CompanionEvent::ModeChanged { mode, .. } => {
                self.mode = *mode;
                self.transitioning = true;
            }
            CompanionEvent::ModeSettled { mode } => {
                self.mode = *mode;
                self.transitioning = false;
            }
            CompanionEvent::MessageAppended { .. } => self.messages += 1,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SessionId;
    use crate::conversation::Message;
    use crate::gesture::Key;

    #[test]
    fn test_request_serialization() {
        let req = Request::Input {
            input: UserInput::KeyDown {
                key: Key::Space,
                repeat: false,
            },
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"input\""));
        assert!(json.contains("key_down"));
        assert!(json.contains("Space"));
    }

    #[test]
    fn test_request_from_renderer() {
        let req: Request = serde_json::from_str(
            r#"{"type":"capture","event":{"session":3,"kind":"partial","text":"hel"}}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            Request::Capture {
                event: CaptureEvent::partial(SessionId(3), "hel")
            }
        );

        let req: Request =
            serde_json::from_str(r#"{"type":"recognizer","availability":"denied"}"#).unwrap();
        assert_eq!(
            req,
            Request::Recognizer {
                availability: RecognizerAvailability::Denied
            }
        );
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(CompanionStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("\"orb\":\"idle\""));
        assert!(json.contains("\"mode\":\"presence\""));
    }

    #[test]
    fn test_notification_keeps_event_tag() {
        let note = Notification::Event {
            event: CompanionEvent::OrbChanged {
                from: OrbState::Idle,
                to: OrbState::Listening,
            },
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["event"]["type"], "orb_changed");
        assert_eq!(value["event"]["to"], "listening");
    }

    #[test]
    fn test_status_follows_events() {
        let mut status = CompanionStatus::default();
        status.apply_event(&CompanionEvent::ModeChanged {
            mode: InteractionMode::Chat,
            previous: InteractionMode::Presence,
        });
        assert_eq!(status.mode, InteractionMode::Chat);
        assert!(status.transitioning);

        status.apply_event(&CompanionEvent::ModeSettled {
            mode: InteractionMode::Chat,
        });
        assert!(!status.transitioning);

        status.apply_event(&CompanionEvent::MessageAppended {
            message: Message::user("hi"),
        });
        status.apply_event(&CompanionEvent::OrbChanged {
            from: OrbState::Idle,
            to: OrbState::Thinking,
        });
        assert_eq!(status.messages, 1);
        assert_eq!(status.orb, OrbState::Thinking);
    }
}
