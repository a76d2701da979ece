//! Shared test doubles

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::capture::{CaptureDevice, CaptureError, SessionId};
use crate::conversation::{BackendError, Exchange, ExchangeReply, Message};
use crate::events::CompanionEvent;
use crate::state::OrbState;

/// Everything queued on a broadcast receiver right now
pub fn drain_events(rx: &mut broadcast::Receiver<CompanionEvent>) -> Vec<CompanionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The orb states entered, in order, among the queued events
pub fn orb_path(rx: &mut broadcast::Receiver<CompanionEvent>) -> Vec<OrbState> {
    drain_events(rx)
        .into_iter()
        .filter_map(|e| match e {
            CompanionEvent::OrbChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect()
}

#[derive(Default)]
struct DeviceLog {
    starts: Vec<SessionId>,
    stops: Vec<SessionId>,
    fail_next: Option<CaptureError>,
}

/// Capture device that records calls and fails on request
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    log: Arc<Mutex<DeviceLog>>,
}

impl ScriptedDevice {
    pub fn fail_next_start(&self, error: CaptureError) {
        self.log.lock().unwrap().fail_next = Some(error);
    }

    pub fn starts(&self) -> Vec<SessionId> {
        self.log.lock().unwrap().starts.clone()
    }

    pub fn stops(&self) -> Vec<SessionId> {
        self.log.lock().unwrap().stops.clone()
    }
}

impl CaptureDevice for ScriptedDevice {
    fn start(&mut self, session: SessionId) -> Result<(), CaptureError> {
        let mut log = self.log.lock().unwrap();
        if let Some(error) = log.fail_next.take() {
            return Err(error);
        }
        log.starts.push(session);
        Ok(())
    }

    fn stop(&mut self, session: SessionId) {
        self.log.lock().unwrap().stops.push(session);
    }
}

/// A recorded exchange call
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeCall {
    pub input: String,
    pub history: Vec<Message>,
}

/// Exchange that answers each input with a scripted result after a delay
#[derive(Clone, Default)]
pub struct MockExchange {
    replies: Arc<Mutex<HashMap<String, (Duration, Result<ExchangeReply, BackendError>)>>>,
    calls: Arc<Mutex<Vec<ExchangeCall>>>,
}

impl MockExchange {
    pub fn reply_to(&self, input: &str, after: Duration, result: Result<ExchangeReply, BackendError>) {
        self.replies
            .lock()
            .unwrap()
            .insert(input.to_string(), (after, result));
    }

    pub fn calls(&self) -> Vec<ExchangeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn exchange(&self, input: &str, history: &[Message]) -> Result<ExchangeReply, BackendError> {
        self.calls.lock().unwrap().push(ExchangeCall {
            input: input.to_string(),
            history: history.to_vec(),
        });
        let scripted = self.replies.lock().unwrap().remove(input);
        match scripted {
            Some((after, result)) => {
                tokio::time::sleep(after).await;
                result
            }
            None => Err(BackendError::Network("no scripted reply".into())),
        }
    }
}
