//! Key definitions and bindings
//!
//! Keys are identified by their physical code (`Space`, `KeyT`, `Escape`)
//! as renderers report them. Bindings map a key to the logical action it
//! stands in for.

use serde::{Deserialize, Serialize};

/// A physical key, by code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Key {
    Space,
    KeyT,
    Escape,
    Other(String),
}

impl Key {
    /// Parse a key code as reported by the renderer
    pub fn from_code(code: &str) -> Self {
        match code {
            "Space" => Key::Space,
            "KeyT" => Key::KeyT,
            "Escape" => Key::Escape,
            other => Key::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Key::Space => "Space",
            Key::KeyT => "KeyT",
            Key::Escape => "Escape",
            Key::Other(code) => code,
        }
    }
}

impl From<String> for Key {
    fn from(code: String) -> Self {
        Key::from_code(&code)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.code().to_string()
    }
}

/// What a bound key means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Down is press-start, up is press-end
    Hold,
    /// Show or hide the transcript overlay
    ToggleTranscript,
    /// Swipe-commit back to presence
    Back,
}

/// Which keys drive which actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub hold: Key,
    pub toggle_transcript: Key,
    pub back: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            hold: Key::Space,
            toggle_transcript: Key::KeyT,
            back: Key::Escape,
        }
    }
}

impl KeyBindings {
    /// Look up the action bound to `key`
    pub fn action(&self, key: &Key) -> Option<KeyAction> {
        if *key == self.hold {
            Some(KeyAction::Hold)
        } else if *key == self.toggle_transcript {
            Some(KeyAction::ToggleTranscript)
        } else if *key == self.back {
            Some(KeyAction::Back)
        } else {
            None
        }
    }
}
