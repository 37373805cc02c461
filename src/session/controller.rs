//! Session handle and event loop.
//!
//! The session spawns a tokio task that owns the protocol state machine
//! and handles:
//!
//! - Deferred detection after the settle delay
//! - Imperative actions from handles (`request_access`, `disconnect`)
//! - Direct-reply outcomes from in-flight requests
//! - Broadcast messages from the extension
//! - Deferred auto-connect after detection
//!
//! Shutting the session down breaks the loop, which cancels pending
//! timers and drops the broadcast subscription; outcomes of requests
//! still in flight are discarded, so no late callback mutates state
//! after teardown.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Sleep, sleep};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ExtensionId;
use crate::protocol::{DirectReply, OutboundPayload};
use crate::render::{Render, View};
use crate::state::{Machine, StateView, Status};
use crate::transport::{Reachability, Transport};

use super::builder::{ConnectionChangeHook, SessionBuilder};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first detection probe, leaving the extension's
/// content script time to inject.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Delay between successful detection and an auto-connect request.
const AUTO_CONNECT_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// SessionConfig
// ============================================================================

/// Validated session configuration, produced by [`SessionBuilder`].
pub(crate) struct SessionConfig {
    /// Extension id addressing the direct channel.
    pub(crate) extension_id: ExtensionId,
    /// Origin reported in access requests.
    pub(crate) origin: String,
    /// Whether to request access automatically after detection.
    pub(crate) auto_connect: bool,
    /// Connection-change notification hook.
    pub(crate) on_connection_change: Option<ConnectionChangeHook>,
    /// Rendering strategy.
    pub(crate) render: Box<dyn Render>,
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the session event loop.
enum SessionCommand {
    /// Start an access request cycle.
    RequestAccess,
    /// Disconnect and reset.
    Disconnect,
    /// Outcome of an in-flight direct request.
    DirectOutcome {
        cycle: u64,
        result: Result<DirectReply>,
    },
    /// Tear the session down.
    Shutdown,
}

// ============================================================================
// Deferred
// ============================================================================

/// Pending scheduled task in the event loop.
///
/// At most one deferred task is armed at a time; dropping the loop
/// cancels it.
enum Deferred {
    /// Run the detection probe.
    Detect,
    /// Fire the auto-connect request.
    AutoConnect,
}

// ============================================================================
// SessionInner
// ============================================================================

/// Shared state behind a session handle.
struct SessionInner {
    /// Extension id addressing the direct channel.
    extension_id: ExtensionId,
    /// Protocol state machine; written only by the event loop.
    machine: Arc<Mutex<Machine>>,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Rendering strategy.
    render: Box<dyn Render>,
    /// Whether the session is still active.
    active: Arc<AtomicBool>,
}

// ============================================================================
// Session
// ============================================================================

/// A handle to an active wallet-extension session.
///
/// Handles are cheap to clone and share; all of them observe the same
/// state and act on the same event loop. After [`Session::shutdown`]
/// every access through any handle is a usage error.
///
/// # Example
///
/// ```no_run
/// use nildata_connect::{BridgeConnection, Session, Result};
///
/// # async fn example() -> Result<()> {
/// let bridge = BridgeConnection::discover().await?;
/// let session = Session::builder()
///     .extension_id("abcdefghijklmnop")
///     .spawn(bridge)?;
///
/// session.request_access()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    /// Shared inner state.
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("extension_id", &self.inner.extension_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Construction
// ============================================================================

impl Session {
    /// Creates a session builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Starts the event loop and returns the first handle.
    pub(crate) fn start<T: Transport>(config: SessionConfig, transport: T) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let machine = Arc::new(Mutex::new(Machine::new()));
        let active = Arc::new(AtomicBool::new(true));

        let SessionConfig {
            extension_id,
            origin,
            auto_connect,
            on_connection_change,
            render,
        } = config;

        tokio::spawn(run_event_loop(EventLoop {
            transport: Arc::new(transport),
            extension_id: extension_id.clone(),
            origin,
            auto_connect,
            hook: on_connection_change,
            machine: Arc::clone(&machine),
            command_tx: command_tx.clone(),
            command_rx,
            active: Arc::clone(&active),
        }));

        Self {
            inner: Arc::new(SessionInner {
                extension_id,
                machine,
                command_tx,
                render,
                active,
            }),
        }
    }
}

// ============================================================================
// Session - Read Surface
// ============================================================================

impl Session {
    /// Returns `true` if the session has not been shut down.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Returns the configured extension id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn extension_id(&self) -> Result<&ExtensionId> {
        self.ensure_active()?;
        Ok(&self.inner.extension_id)
    }

    /// Returns the current DID, present only while granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn nillion_did(&self) -> Result<Option<String>> {
        self.ensure_active()?;
        Ok(self.inner.machine.lock().snapshot().nillion_did)
    }

    /// Returns `true` if access is currently granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn connected(&self) -> Result<bool> {
        self.ensure_active()?;
        Ok(self.inner.machine.lock().connected())
    }

    /// Returns the current user-facing status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn status(&self) -> Result<Status> {
        self.ensure_active()?;
        Ok(self.inner.machine.lock().snapshot().status)
    }

    /// Returns a consistent snapshot of the connection state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn snapshot(&self) -> Result<StateView> {
        self.ensure_active()?;
        Ok(self.inner.machine.lock().snapshot())
    }

    /// Renders the current state with the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn view(&self) -> Result<View> {
        let snapshot = self.snapshot()?;
        Ok(self.inner.render.render(&snapshot))
    }
}

// ============================================================================
// Session - Actions
// ============================================================================

impl Session {
    /// Requests access to the extension.
    ///
    /// A no-op while a request is already in flight or access is
    /// already granted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn request_access(&self) -> Result<()> {
        self.send_command(SessionCommand::RequestAccess)
    }

    /// Disconnects from the extension.
    ///
    /// Valid from any state as a hard reset; never fails on an active
    /// session and is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] if the session was shut down.
    pub fn disconnect(&self) -> Result<()> {
        self.send_command(SessionCommand::Disconnect)
    }

    /// Shuts the session down.
    ///
    /// Tears down the event loop, cancelling pending timers and
    /// discarding outcomes of requests still in flight. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.active.swap(false, Ordering::AcqRel) {
            debug!(extension_id = %self.inner.extension_id, "Shutting session down");
            let _ = self.inner.command_tx.send(SessionCommand::Shutdown);
        }
    }

    /// Sends a command to the event loop, failing on an inactive session.
    fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.ensure_active()?;
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| Self::inactive_error())
    }

    /// Verifies the session is still active.
    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Self::inactive_error())
        }
    }

    fn inactive_error() -> Error {
        Error::usage(
            "session has been shut down. Construct a new session with Session::builder()",
        )
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Everything the event loop task owns.
struct EventLoop<T: Transport> {
    transport: Arc<T>,
    extension_id: ExtensionId,
    origin: String,
    auto_connect: bool,
    hook: Option<ConnectionChangeHook>,
    machine: Arc<Mutex<Machine>>,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    active: Arc<AtomicBool>,
}

/// Runs the session event loop until shutdown.
async fn run_event_loop<T: Transport>(mut ctx: EventLoop<T>) {
    let mut broadcast_rx = ctx.transport.subscribe();
    let mut broadcast_open = true;

    // The settle delay precedes detection, leaving the bridge time to
    // come up; armed like any other deferred task so shutdown cancels it.
    let mut deferred: Option<(Deferred, Pin<Box<Sleep>>)> =
        Some((Deferred::Detect, Box::pin(sleep(SETTLE_DELAY))));

    loop {
        tokio::select! {
            // Resolves only while a timer is armed; parks otherwise.
            () = wait_deferred(&mut deferred) => {
                let Some((kind, _)) = deferred.take() else { continue };
                match kind {
                    Deferred::Detect => {
                        if detect(&ctx).await && ctx.auto_connect {
                            debug!("Auto-connect armed");
                            deferred = Some((
                                Deferred::AutoConnect,
                                Box::pin(sleep(AUTO_CONNECT_DELAY)),
                            ));
                        }
                    }
                    Deferred::AutoConnect => start_request(&ctx),
                }
            }

            message = broadcast_rx.recv(), if broadcast_open => {
                match message {
                    Ok(message) => {
                        let change = ctx.machine.lock().broadcast(&message);
                        notify(&ctx.hook, change);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Broadcast receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Broadcast channel closed");
                        broadcast_open = false;
                    }
                }
            }

            command = ctx.command_rx.recv() => {
                match command {
                    Some(SessionCommand::RequestAccess) => start_request(&ctx),

                    Some(SessionCommand::Disconnect) => {
                        let change = ctx.machine.lock().disconnect();
                        notify(&ctx.hook, change);
                    }

                    Some(SessionCommand::DirectOutcome { cycle, result }) => {
                        match result {
                            Ok(reply) => {
                                let change = ctx.machine.lock().direct_reply(cycle, &reply);
                                notify(&ctx.hook, change);
                            }
                            Err(e) => {
                                warn!(cycle, error = %e, "Access request delivery failed");
                                ctx.machine.lock().direct_failure(cycle);
                            }
                        }
                    }

                    Some(SessionCommand::Shutdown) => {
                        debug!("Shutdown command received");
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

    ctx.active.store(false, Ordering::Release);
    debug!("Session event loop terminated");
}

/// Awaits the armed deferred task, or parks when none is armed.
async fn wait_deferred(deferred: &mut Option<(Deferred, Pin<Box<Sleep>>)>) {
    match deferred.as_mut() {
        Some((_, timer)) => timer.as_mut().await,
        None => future::pending().await,
    }
}

/// Runs the detection probe. Returns `true` if the extension answered.
async fn detect<T: Transport>(ctx: &EventLoop<T>) -> bool {
    match ctx.transport.ping(&ctx.extension_id).await {
        Ok(Reachability::Reachable) => {
            ctx.machine.lock().mark_detected();
            true
        }
        Ok(Reachability::Unreachable) => {
            ctx.machine.lock().mark_unreachable();
            false
        }
        Err(e) if e.is_unsupported() => {
            ctx.machine.lock().mark_unsupported();
            false
        }
        Err(e) => {
            warn!(error = %e, "Detection probe failed");
            ctx.machine.lock().mark_unreachable();
            false
        }
    }
}

/// Starts an access request cycle, spawning the direct send.
///
/// The outcome is posted back into the loop; if the loop is gone by
/// then, the outcome is discarded.
fn start_request<T: Transport>(ctx: &EventLoop<T>) {
    let Some(cycle) = ctx.machine.lock().begin_request() else {
        trace!("Access request ignored");
        return;
    };

    let transport = Arc::clone(&ctx.transport);
    let extension_id = ctx.extension_id.clone();
    let payload = OutboundPayload::access_request(ctx.origin.clone());
    let command_tx = ctx.command_tx.clone();

    tokio::spawn(async move {
        let result = transport.send(&extension_id, payload).await;
        let _ = command_tx.send(SessionCommand::DirectOutcome { cycle, result });
    });
}

/// Delivers a connection-change notification, if one was produced.
fn notify(hook: &Option<ConnectionChangeHook>, change: Option<crate::state::ConnectionChange>) {
    if let (Some(hook), Some(change)) = (hook.as_ref(), change) {
        hook(change);
    }
}

// ============================================================================
// Tests
// ============================================================================
