//! Runtime driver
//!
//! Runs the companion on one task. Timers and exchange calls execute on
//! spawned tasks that only ever report back through the completion
//! channel, so every mutation happens on the runtime task in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::companion::{Companion, Input};
use crate::conversation::Exchange;
use crate::effect::Effect;

const COMPLETION_CHANNEL_SIZE: usize = 64;

pub struct Runtime {
    companion: Companion,
    exchange: Arc<dyn Exchange>,
    completion_tx: mpsc::Sender<Input>,
    completion_rx: mpsc::Receiver<Input>,
}

impl Runtime {
    pub fn new(companion: Companion, exchange: Arc<dyn Exchange>) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CHANNEL_SIZE);
        Self {
            companion,
            exchange,
            completion_tx,
            completion_rx,
        }
    }

    pub fn companion(&self) -> &Companion {
        &self.companion
    }

    /// Process inputs until every external sender is dropped
    pub async fn run(&mut self, mut input_rx: mpsc::Receiver<Input>) {
        info!(
            orb = %self.companion.orb_state(),
            mode = %self.companion.mode(),
            "companion runtime started"
        );

        loop {
            let input = tokio::select! {
                input = input_rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
                Some(completion) = self.completion_rx.recv() => completion,
            };

            self.handle(input);
        }

        info!("companion runtime stopped");
    }

    /// Handle one input and start whatever it asks for
    pub fn handle(&mut self, input: impl Into<Input>) {
        for effect in self.companion.handle(input.into()) {
            self.execute(effect);
        }
    }

    fn execute(&self, effect: Effect) {
        let tx = self.completion_tx.clone();
        match effect {
            Effect::Schedule { timer, token, after } => {
                debug!(%timer, token, ?after, "timer scheduled");
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Input::TimerFired { timer, token }).await;
                });
            }
            Effect::Exchange {
                request,
                input,
                history,
            } => {
                let exchange = Arc::clone(&self.exchange);
                tokio::spawn(async move {
                    let result = exchange.exchange(&input, &history).await;
                    debug!(%request, ok = result.is_ok(), "exchange finished");
                    let _ = tx.send(Input::ExchangeCompleted { request, result }).await;
                });
            }
        }
    }
}
