//! Orb state machine
//!
//! One owned state cell, last-write-wins. Every write advances a
//! monotonic epoch; a scheduled transition captures the epoch when it is
//! scheduled and is dropped if the epoch has moved on by the time it fires.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::CompanionEvent;

/// The visible indicator of system activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbState {
    /// Nothing in progress
    #[default]
    Idle,
    /// A capture session owns the orb
    Listening,
    /// An exchange call is in flight
    Thinking,
    /// A reply is being performed
    Speaking,
}

impl std::fmt::Display for OrbState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbState::Idle => write!(f, "idle"),
            OrbState::Listening => write!(f, "listening"),
            OrbState::Thinking => write!(f, "thinking"),
            OrbState::Speaking => write!(f, "speaking"),
        }
    }
}

/// Write counter of the orb cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

/// The orb state cell
pub struct Orb {
    state: OrbState,
    epoch: Epoch,
    event_tx: broadcast::Sender<CompanionEvent>,
}

impl Orb {
    pub fn new(event_tx: broadcast::Sender<CompanionEvent>) -> Self {
        Self {
            state: OrbState::Idle,
            epoch: Epoch(0),
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> OrbState {
        self.state
    }

    /// Get the current epoch
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// The only mutator. Overwrites whatever is displayed and invalidates
    /// every transition scheduled against an earlier epoch.
    pub fn set(&mut self, next: OrbState) -> Epoch {
        let old_state = self.state;
        self.epoch = Epoch(self.epoch.0 + 1);
        self.state = next;

        if old_state != next {
            info!(from = %old_state, to = %next, epoch = self.epoch.0, "orb transition");
            let _ = self.event_tx.send(CompanionEvent::OrbChanged {
                from: old_state,
                to: next,
            });
        }

        self.epoch
    }

    /// Apply `next` only if nothing has written the orb since `epoch`
    pub fn set_if_current(&mut self, epoch: Epoch, next: OrbState) -> Option<Epoch> {
        if self.epoch != epoch {
            debug!(
                scheduled = epoch.0,
                current = self.epoch.0,
                skipped = %next,
                "stale orb transition dropped"
            );
            return None;
        }
        Some(self.set(next))
    }
}
