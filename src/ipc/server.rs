//! Unix domain socket server for IPC
//!
//! Provides request-response communication with the renderer and pushes
//! companion events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::capture::RecognizerHandle;
use crate::companion::Input;
use crate::events::CompanionEvent;

use super::protocol::{CompanionStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Source of events for subscribed clients
    event_tx: broadcast::Sender<CompanionEvent>,
    input_tx: mpsc::Sender<Input>,
    recognizer: RecognizerHandle,
}

/// Shared server state
struct ServerState {
    status: CompanionStatus,
    start_time: std::time::Instant,
}

/// What a client connection needs from the server
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    event_tx: broadcast::Sender<CompanionEvent>,
    input_tx: mpsc::Sender<Input>,
    recognizer: RecognizerHandle,
}

impl Server {
    /// Bind the socket. Inputs from clients go to `input_tx`; subscribed
    /// clients receive everything sent on `event_tx`.
    pub fn with_events(
        socket_path: &Path,
        event_tx: broadcast::Sender<CompanionEvent>,
        input_tx: mpsc::Sender<Input>,
        recognizer: RecognizerHandle,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .context("failed to restrict socket permissions")?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: CompanionStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            state,
            shutdown_tx,
            event_tx,
            input_tx,
            recognizer,
        })
    }

    /// Fold a companion event into the status snapshot
    pub async fn apply_event(&self, event: &CompanionEvent) {
        let mut state = self.state.write().await;
        let previous = state.status.mode;
        state.status.apply_event(event);
        if previous != state.status.mode {
            info!(from = %previous, to = %state.status.mode, "IPC server: mode updated");
        }
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let ctx = ClientContext {
                        state: Arc::clone(&self.state),
                        event_tx: self.event_tx.clone(),
                        input_tx: self.input_tx.clone(),
                        recognizer: self.recognizer.clone(),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, ctx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, ctx: ClientContext) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a half-read frame is never
        // dropped by the select below.
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Request>>(16);
        let reader_task = tokio::spawn(async move {
            loop {
                let request = match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        serde_json::from_slice(&frame).context("failed to parse request")
                    }
                    Ok(None) => break,
                    Err(e) => Err(e),
                };
                let failed = request.is_err();
                if request_tx.send(request).await.is_err() || failed {
                    break;
                }
            }
        });

        let mut events: Option<broadcast::Receiver<CompanionEvent>> = None;
        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let request = match request {
                        Some(Ok(request)) => request,
                        Some(Err(e)) => break Err(e),
                        None => {
                            debug!("client disconnected");
                            break Ok(());
                        }
                    };
                    debug!(?request, "received request");

                    let subscribe = matches!(request, Request::Subscribe);
                    let response = Self::process_request(request, &ctx).await;
                    if subscribe && events.is_none() {
                        events = Some(ctx.event_tx.subscribe());
                        debug!("client subscribed to notifications");
                    }
                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = recv_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            let note = Notification::Event { event };
                            if let Err(e) = write_frame(&mut writer, &note).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged behind companion events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, ctx: &ClientContext) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::GetStatus => {
                let mut state = ctx.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                state.status.recognizer = ctx.recognizer.get();
                Response::Status(state.status.clone())
            }

            Request::Subscribe => Response::Subscribed,

            Request::Input { input } => Self::forward(ctx, input.into()).await,

            Request::Capture { event } => Self::forward(ctx, event.into()).await,

            Request::Recognizer { availability } => {
                ctx.recognizer.set(availability);
                Response::Accepted
            }
        }
    }

    async fn forward(ctx: &ClientContext, input: Input) -> Response {
        match ctx.input_tx.send(input).await {
            Ok(()) => Response::Accepted,
            Err(_) => Response::error("companion_stopped", "companion is no longer running"),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; pends forever otherwise
async fn recv_event(
    events: &mut Option<broadcast::Receiver<CompanionEvent>>,
) -> Result<CompanionEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed frame. `None` on a clean disconnect.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        anyhow::bail!("message of {len} bytes exceeds limit");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Write a length-prefixed JSON message
async fn write_frame<W: AsyncWrite + Unpin, T: serde::Serialize>(writer: &mut W, msg: &T) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
