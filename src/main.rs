//! nex-companion-daemon: host process for the NEX companion core
//!
//! The renderer connects over a Unix socket, forwards raw input and
//! recognizer events, and subscribes to companion events to draw the orb,
//! the mode, subtitles and notices. This process owns all interaction
//! state and talks to the exchange endpoint.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use nex_companion::capture::{RecognizerHandle, RemoteDevice};
use nex_companion::companion::{Companion, Input, UserInput};
use nex_companion::config::Config;
use nex_companion::conversation::HttpExchange;
use nex_companion::events::CompanionEvent;
use nex_companion::ipc::Server;
use nex_companion::lifecycle::ShutdownSignal;
use nex_companion::runtime::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "nex-companion-daemon starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        endpoint = %config.exchange.base_url,
        authenticated = config.exchange.auth_token.is_some(),
        "configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    // Renderer -> companion
    let (input_tx, input_rx) = mpsc::channel::<Input>(64);
    // Companion -> renderer and status snapshot
    let (event_tx, _event_rx) = broadcast::channel::<CompanionEvent>(256);

    let recognizer = RecognizerHandle::default();
    let device = RemoteDevice::new(recognizer.clone());
    let exchange = HttpExchange::new(&config.exchange)?;

    let companion = Companion::new(config.tuning.clone(), Box::new(device), event_tx.clone());
    let mut runtime = Runtime::new(companion, Arc::new(exchange));

    let server = Server::with_events(
        &config.socket_path,
        event_tx.clone(),
        input_tx,
        recognizer,
    )?;

    let mut status_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, entering main loop");

    tokio::select! {
        _ = runtime.run(input_rx) => {
            info!("companion runtime exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the status snapshot in step with the companion
        _ = async {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "companion event");
                        server_for_events.apply_event(&event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "companion event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("companion event handler exited");
        }

        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "failed to install signal handlers"),
            }
        }
    }

    info!("shutting down...");

    runtime.handle(UserInput::Leave);
    server.shutdown().await;

    info!("nex-companion-daemon stopped");

    Ok(())
}
