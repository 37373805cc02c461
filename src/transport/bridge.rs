//! WebSocket bridge connection and event loop.
//!
//! This module implements [`Transport`] over a WebSocket to the
//! extension's content-script bridge, including request/reply
//! correlation and broadcast routing.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming frames from the bridge (direct replies, broadcasts)
//! - Outgoing requests from the session
//! - Request/reply correlation by UUID
//! - Broadcast fan-out to subscribers

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ExtensionId, RequestId};
use crate::protocol::{
    BroadcastMessage, DirectFrame, DirectReply, DirectRequest, Envelope, OutboundPayload,
};
use crate::transport::{Reachability, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming the bridge endpoint.
///
/// Absence means the host lacks the extension-messaging capability.
pub const BRIDGE_URL_VAR: &str = "NILDATA_BRIDGE_URL";

/// Maximum wait for a liveness probe reply before the extension is
/// considered unreachable.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum pending direct requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 8;

/// Broadcast fan-out buffer size.
const BROADCAST_CAPACITY: usize = 32;

// ============================================================================
// Types
// ============================================================================

/// WebSocket stream to the bridge.
type BridgeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Map of request ids to reply channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<DirectFrame>>>;

// ============================================================================
// BridgeCommand
// ============================================================================

/// Internal commands for the event loop.
enum BridgeCommand {
    /// Send a request and route the reply to `reply_tx`.
    Send {
        request: DirectRequest,
        reply_tx: oneshot::Sender<Result<DirectFrame>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// BridgeConnection
// ============================================================================

/// WebSocket connection to the extension's content-script bridge.
///
/// Handles request/reply correlation and broadcast routing. The
/// connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `BridgeConnection` is `Send + Sync` and can be shared across tasks.
/// All operations are non-blocking.
pub struct BridgeConnection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<BridgeCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Broadcast fan-out (shared with event loop).
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
}

impl Clone for BridgeConnection {
    fn clone(&self) -> Self {
        Self {
            command_tx: self.command_tx.clone(),
            correlation: Arc::clone(&self.correlation),
            broadcast_tx: self.broadcast_tx.clone(),
        }
    }
}

impl BridgeConnection {
    /// Connects to a bridge endpoint and spawns the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the WebSocket connection cannot
    /// be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        debug!(url, "Bridge connection established");
        Ok(Self::from_stream(ws_stream))
    }

    /// Discovers the bridge endpoint from the environment and connects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnsupported`] when no endpoint is
    /// configured, i.e. the host lacks the extension-messaging
    /// capability.
    pub async fn discover() -> Result<Self> {
        let url = env::var(BRIDGE_URL_VAR).map_err(|_| Error::EnvironmentUnsupported)?;
        Self::connect(&url).await
    }

    /// Creates a connection from an established WebSocket stream.
    pub(crate) fn from_stream(ws_stream: BridgeStream) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            broadcast_tx.clone(),
        ));

        Self {
            command_tx,
            correlation,
            broadcast_tx,
        }
    }

    /// Returns the number of pending direct requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Shuts down the connection gracefully.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(BridgeCommand::Shutdown);
    }

    /// Sends a framed request and waits for the correlated reply frame.
    async fn exchange(&self, request: DirectRequest) -> Result<DirectFrame> {
        // Check pending request limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(BridgeCommand::Send { request, reply_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        // A dropped sender means the event loop died; the RecvError
        // converts to a transport-class error.
        reply_rx.await?
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: BridgeStream,
        mut command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the bridge
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_frame(&text, &correlation, &broadcast_tx);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Bridge closed the connection");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("Bridge stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the session
                command = command_rx.recv() => {
                    match command {
                        Some(BridgeCommand::Send { request, reply_tx }) => {
                            Self::handle_send_command(
                                request,
                                reply_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(BridgeCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed timed-out correlation");
                        }

                        Some(BridgeCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        Self::fail_pending_requests(&correlation);

        debug!("Bridge event loop terminated");
    }

    /// Handles an incoming text frame from the bridge.
    ///
    /// Frames carrying a request id are direct replies; frames carrying
    /// the broadcast envelope tag are fanned out to subscribers.
    /// Anything else is dropped.
    fn handle_incoming_frame(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        broadcast_tx: &broadcast::Sender<BroadcastMessage>,
    ) {
        if let Ok(frame) = from_str::<DirectFrame>(text) {
            let tx = correlation.lock().remove(&frame.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(frame));
            } else {
                warn!(id = %frame.id, "Reply for unknown request");
            }

            return;
        }

        if let Some(envelope) = Envelope::from_text(text) {
            let message = envelope.message();
            trace!(?message, "Broadcast message received");
            // No subscribers is fine; send only fails then.
            let _ = broadcast_tx.send(message);
            return;
        }

        trace!(text = %text, "Dropping non-protocol frame");
    }

    /// Handles a send command from the session.
    async fn handle_send_command(
        request: DirectRequest,
        reply_tx: oneshot::Sender<Result<DirectFrame>>,
        ws_write: &mut SplitSink<BridgeStream, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = reply_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, reply_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(e.into()));
            }
        }

        trace!(%request_id, "Request sent");
    }

    /// Fails all pending requests with a ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

#[async_trait::async_trait]
impl Transport for BridgeConnection {
    async fn ping(&self, extension_id: &ExtensionId) -> Result<Reachability> {
        let request = DirectRequest::new(extension_id.clone(), OutboundPayload::Ping);
        let request_id = request.id;

        match timeout(PING_TIMEOUT, self.exchange(request)).await {
            // Any non-error reply counts as presence
            Ok(Ok(frame)) if frame.error.is_none() => Ok(Reachability::Reachable),
            Ok(Ok(frame)) => {
                debug!(error = ?frame.error, "Ping delivery failed");
                Ok(Reachability::Unreachable)
            }
            Ok(Err(e)) if e.is_transport() => Ok(Reachability::Unreachable),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let _ = self
                    .command_tx
                    .send(BridgeCommand::RemoveCorrelation(request_id));
                debug!(timeout_ms = PING_TIMEOUT.as_millis() as u64, "Ping timed out");
                Ok(Reachability::Unreachable)
            }
        }
    }

    async fn send(
        &self,
        extension_id: &ExtensionId,
        payload: OutboundPayload,
    ) -> Result<DirectReply> {
        let request = DirectRequest::new(extension_id.clone(), payload);

        // No timeout beyond what the bridge itself imposes: a hung popup
        // leaves the request pending until the user acts.
        let frame = self.exchange(request).await?;

        match frame.error {
            Some(message) => Err(Error::transport(message)),
            None => Ok(frame.reply),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast_tx.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
