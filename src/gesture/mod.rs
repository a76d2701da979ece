//! Gesture module for press, drag and keyboard input
//!
//! Classifies raw input from the renderer into the intents the mode
//! controller acts on.

mod classifier;
mod keys;

pub use classifier::{GestureClassifier, GestureSession, Intent, Surface, Vector};
pub use keys::{Key, KeyAction, KeyBindings};
