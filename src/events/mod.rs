//! Events module for companion state changes
//!
//! Every component writes its observable changes to one broadcast
//! channel of [`CompanionEvent`]s. Renderers derive what they draw from
//! these events rather than from the inputs that caused them.

use serde::{Deserialize, Serialize};

use crate::capture::SessionId;
use crate::conversation::Message;
use crate::state::{InteractionMode, OrbState};

/// Kinds of user-visible, recoverable problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    DeviceUnavailable,
    PermissionDenied,
    CaptureFailed,
    Backend,
    Auth,
}

/// A transient, dismissible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Token used to dismiss or expire exactly this notice
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// Events emitted by the companion core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompanionEvent {
    /// Orb moved to a new state
    OrbChanged { from: OrbState, to: OrbState },

    /// Interaction mode flipped; `transitioning` is latched until settled
    ModeChanged {
        mode: InteractionMode,
        previous: InteractionMode,
    },

    /// Mode transition finished animating
    ModeSettled { mode: InteractionMode },

    /// Capture session opened; the recognizer should start listening
    CaptureStarted { session: SessionId },

    /// Best-effort transcript so far, replacing the previous one
    InterimTranscript { session: SessionId, text: String },

    /// Stop was requested; the session still owns the orb until it ends
    CaptureStopRequested { session: SessionId },

    /// Capture session ended
    CaptureEnded {
        session: SessionId,
        /// Duration in milliseconds that the session was open
        duration_ms: u64,
    },

    /// Capture session was cut short and its results will be discarded
    CaptureAborted { session: SessionId },

    /// A message was appended to history
    MessageAppended { message: Message },

    /// Subtitle text shown under the orb (`None` clears it)
    SubtitleChanged { text: Option<String> },

    /// Transcript overlay opened or closed
    TranscriptVisibility { visible: bool },

    /// A recoverable problem to show the user
    Notice(Notice),

    /// The notice with this id was dismissed or expired
    NoticeCleared { id: u64 },

    /// Quota details returned alongside a reply
    QuotaUpdated {
        messages_remaining_today: Option<u32>,
        tier: Option<String>,
    },
}

impl std::fmt::Display for CompanionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanionEvent::OrbChanged { from, to } => write!(f, "ORB_CHANGED ({} -> {})", from, to),
            CompanionEvent::ModeChanged { mode, previous } => {
                write!(f, "MODE_CHANGED ({} -> {})", previous, mode)
            }
            CompanionEvent::ModeSettled { mode } => write!(f, "MODE_SETTLED ({})", mode),
            CompanionEvent::CaptureStarted { session } => write!(f, "CAPTURE_STARTED ({})", session),
            CompanionEvent::InterimTranscript { session, text } => {
                write!(f, "INTERIM_TRANSCRIPT ({}: {:?})", session, text)
            }
            CompanionEvent::CaptureStopRequested { session } => {
                write!(f, "CAPTURE_STOP_REQUESTED ({})", session)
            }
            CompanionEvent::CaptureEnded { session, duration_ms } => {
                write!(f, "CAPTURE_ENDED ({}, {}ms)", session, duration_ms)
            }
            CompanionEvent::CaptureAborted { session } => write!(f, "CAPTURE_ABORTED ({})", session),
            CompanionEvent::MessageAppended { message } => {
                write!(f, "MESSAGE_APPENDED ({})", message.role)
            }
            CompanionEvent::SubtitleChanged { text } => {
                write!(f, "SUBTITLE_CHANGED ({})", if text.is_some() { "shown" } else { "cleared" })
            }
            CompanionEvent::TranscriptVisibility { visible } => {
                write!(f, "TRANSCRIPT_VISIBILITY ({})", visible)
            }
            CompanionEvent::Notice(notice) => write!(f, "NOTICE ({:?})", notice.kind),
            CompanionEvent::NoticeCleared { id } => write!(f, "NOTICE_CLEARED ({})", id),
            CompanionEvent::QuotaUpdated { .. } => write!(f, "QUOTA_UPDATED"),
        }
    }
}
