//! Side effects requested by the synchronous components
//!
//! Components never sleep or spawn. They push an [`Effect`] and the
//! runtime performs it, feeding the completion back as an input carrying
//! the same token. A handler that finds its token superseded does nothing.

use std::time::Duration;

use crate::conversation::{Message, RequestId};

/// Independently scheduled timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Press held long enough to count as a hold
    PressDebounce,
    /// Press held long enough to open the transcript overlay
    LongPress,
    /// Mode flip finished animating
    ModeSettle,
    /// Reply finished "performing"
    SpeakingDwell,
    /// Subtitle finished lingering
    SubtitleFade,
    /// Notice expired without being dismissed
    NoticeExpiry,
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timer::PressDebounce => write!(f, "press_debounce"),
            Timer::LongPress => write!(f, "long_press"),
            Timer::ModeSettle => write!(f, "mode_settle"),
            Timer::SpeakingDwell => write!(f, "speaking_dwell"),
            Timer::SubtitleFade => write!(f, "subtitle_fade"),
            Timer::NoticeExpiry => write!(f, "notice_expiry"),
        }
    }
}

/// Work for the runtime to carry out on behalf of a component
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Fire `timer` with `token` after `after`
    Schedule {
        timer: Timer,
        token: u64,
        after: Duration,
    },
    /// Issue one exchange call
    Exchange {
        request: RequestId,
        input: String,
        history: Vec<Message>,
    },
}

/// Effects accumulated while handling one input
pub type Effects = Vec<Effect>;
