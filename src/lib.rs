//! nex-companion: interaction orchestration core for the NEX companion
//!
//! The core owns the orb, the interaction mode, gesture classification,
//! capture sessions and the conversation. It is driven one input at a
//! time by [`runtime::Runtime`] and reports every observable change as a
//! [`events::CompanionEvent`]. The daemon binary hosts it behind the
//! IPC socket.

pub mod capture;
pub mod companion;
pub mod config;
pub mod conversation;
pub mod effect;
pub mod events;
pub mod gesture;
pub mod ipc;
pub mod lifecycle;
pub mod runtime;
pub mod state;

#[cfg(test)]
mod test_utils;
