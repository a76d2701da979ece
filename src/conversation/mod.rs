//! Conversation module
//!
//! Message history, the backend exchange seam, and the orchestrator that
//! sequences orb transitions around exchange calls.

mod exchange;
mod message;
mod orchestrator;

pub use exchange::{BackendError, Exchange, ExchangeReply, HttpExchange};
pub use message::{context_window, Message, Role};
pub use orchestrator::{Orchestrator, RequestId, SubmitOutcome};
