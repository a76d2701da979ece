//! State module for the orb and interaction mode
//!
//! - Orb: idle, listening, thinking, speaking; one owned cell with epochs
//! - Mode: presence or chat, plus the transition latch and capture ownership

mod mode;
mod orb;

pub use mode::{InteractionMode, ModeController, ModeError};
pub use orb::{Epoch, Orb, OrbState};
