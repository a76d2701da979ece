//! IPC module for daemon-renderer communication

mod protocol;
mod server;

pub use protocol::{CompanionStatus, Notification, Request, Response};
pub use server::Server;
