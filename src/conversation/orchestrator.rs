//! Conversation orchestrator
//!
//! Owns the message history and drives the orb around exchange calls.
//! Overlapping submits are allowed. Each gets a monotonically increasing
//! [`RequestId`] and replies are applied strictly in issue order; a reply
//! only moves the orb if nothing else has written it since the request
//! entered `thinking`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Tuning;
use crate::effect::{Effect, Effects, Timer};
use crate::events::CompanionEvent;
use crate::state::{Epoch, Orb, OrbState};

use super::exchange::{BackendError, ExchangeReply};
use super::message::{context_window, Message};

/// Identity of one exchange call, in issue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exchange-{}", self.0)
    }
}

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user message was appended and an exchange issued
    Accepted(RequestId),
    /// Empty or whitespace-only input; nothing happened
    Empty,
}

struct PendingExchange {
    thinking_epoch: Epoch,
    result: Option<Result<ExchangeReply, BackendError>>,
}

pub struct Orchestrator {
    history: Vec<Message>,
    history_window: usize,
    speaking_dwell: Duration,
    subtitle_fade: Duration,
    next_request: u64,
    pending: BTreeMap<RequestId, PendingExchange>,
    subtitle: Option<String>,
    subtitle_token: u64,
    event_tx: broadcast::Sender<CompanionEvent>,
}

impl Orchestrator {
    pub fn new(tuning: &Tuning, event_tx: broadcast::Sender<CompanionEvent>) -> Self {
        Self {
            history: Vec::new(),
            history_window: tuning.history_window,
            speaking_dwell: tuning.speaking_dwell(),
            subtitle_fade: tuning.subtitle_fade(),
            next_request: 0,
            pending: BTreeMap::new(),
            subtitle: None,
            subtitle_token: 0,
            event_tx,
        }
    }

    /// Full history, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    /// Exchange calls issued but not yet applied
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Commit user input and issue an exchange with the recent history
    pub fn submit_user_text(&mut self, text: &str, orb: &mut Orb, effects: &mut Effects) -> SubmitOutcome {
        let input = text.trim();
        if input.is_empty() {
            debug!("empty input ignored");
            return SubmitOutcome::Empty;
        }

        let context = context_window(&self.history, self.history_window).to_vec();
        self.append(Message::user(input));

        let thinking_epoch = orb.set(OrbState::Thinking);
        self.next_request += 1;
        let request = RequestId(self.next_request);
        self.pending.insert(
            request,
            PendingExchange {
                thinking_epoch,
                result: None,
            },
        );

        info!(%request, context = context.len(), "exchange issued");
        effects.push(Effect::Exchange {
            request,
            input: input.to_string(),
            history: context,
        });
        SubmitOutcome::Accepted(request)
    }

    /// Record a completion and apply every completion that is now at the
    /// head of the issue order. Returns the failures that were applied.
    pub fn on_exchange_completed(
        &mut self,
        request: RequestId,
        result: Result<ExchangeReply, BackendError>,
        orb: &mut Orb,
        effects: &mut Effects,
    ) -> Vec<BackendError> {
        match self.pending.get_mut(&request) {
            Some(pending) if pending.result.is_none() => pending.result = Some(result),
            _ => {
                warn!(%request, "completion for unknown exchange dropped");
                return Vec::new();
            }
        }

        let mut failures = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.get().result.is_none() {
                debug!(head = %entry.key(), "waiting for earlier exchange");
                break;
            }
            let (request, pending) = entry.remove_entry();
            if let Some(Err(e)) = self.apply(request, pending, orb, effects) {
                failures.push(e);
            }
        }
        failures
    }

    fn apply(
        &mut self,
        request: RequestId,
        pending: PendingExchange,
        orb: &mut Orb,
        effects: &mut Effects,
    ) -> Option<Result<(), BackendError>> {
        let owns_orb = orb.epoch() == pending.thinking_epoch;
        match pending.result? {
            Ok(reply) => {
                info!(%request, owns_orb, "exchange reply applied");
                self.append(Message::companion(reply.reply.clone()));
                if reply.messages_remaining_today.is_some() || reply.tier.is_some() {
                    let _ = self.event_tx.send(CompanionEvent::QuotaUpdated {
                        messages_remaining_today: reply.messages_remaining_today,
                        tier: reply.tier,
                    });
                }
                if owns_orb {
                    let speaking = orb.set(OrbState::Speaking);
                    self.show_subtitle(reply.reply);
                    effects.push(Effect::Schedule {
                        timer: Timer::SpeakingDwell,
                        token: speaking.0,
                        after: self.speaking_dwell,
                    });
                }
                Some(Ok(()))
            }
            Err(e) => {
                warn!(%request, error = %e, owns_orb, "exchange failed");
                if owns_orb {
                    orb.set(OrbState::Idle);
                }
                Some(Err(e))
            }
        }
    }

    /// Dwell elapsed for the `speaking` write with this epoch
    pub fn on_dwell_elapsed(&mut self, token: u64, orb: &mut Orb, effects: &mut Effects) {
        if orb.set_if_current(Epoch(token), OrbState::Idle).is_none() {
            return;
        }
        if self.subtitle.is_some() {
            self.subtitle_token += 1;
            effects.push(Effect::Schedule {
                timer: Timer::SubtitleFade,
                token: self.subtitle_token,
                after: self.subtitle_fade,
            });
        }
    }

    pub fn on_subtitle_fade(&mut self, token: u64) {
        if token == self.subtitle_token {
            self.clear_subtitle();
        }
    }

    pub fn clear_subtitle(&mut self) {
        self.subtitle_token += 1;
        if self.subtitle.take().is_some() {
            let _ = self.event_tx.send(CompanionEvent::SubtitleChanged { text: None });
        }
    }

    fn show_subtitle(&mut self, text: String) {
        self.subtitle_token += 1;
        self.subtitle = Some(text.clone());
        let _ = self.event_tx.send(CompanionEvent::SubtitleChanged { text: Some(text) });
    }

    fn append(&mut self, message: Message) {
        self.history.push(message.clone());
        let _ = self.event_tx.send(CompanionEvent::MessageAppended { message });
    }
}
