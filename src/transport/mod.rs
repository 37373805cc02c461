//! Transport layer for the extension boundary.
//!
//! This module wraps the two channels to the wallet extension behind the
//! [`Transport`] trait:
//!
//! - **Direct channel**: request/response addressed to a named extension.
//! - **Broadcast channel**: unsolicited messages from the extension's
//!   content-script bridge.
//!
//! The production implementation, [`BridgeConnection`], speaks JSON over
//! a WebSocket to the bridge:
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Extension      │
//! │                 │         WebSocket            │  (Content       │
//! │  BridgeConn     │◄────────────────────────────►│   Script        │
//! │                 │      localhost:PORT          │   Bridge)       │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! Hosts without a bridge endpoint lack the extension-messaging
//! capability entirely; every operation then reports
//! [`Error::EnvironmentUnsupported`](crate::Error::EnvironmentUnsupported).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bridge` | WebSocket bridge connection and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket bridge connection and event loop.
pub mod bridge;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::identifiers::ExtensionId;
use crate::protocol::{BroadcastMessage, DirectReply, OutboundPayload};

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::BridgeConnection;

// ============================================================================
// Reachability
// ============================================================================

/// Outcome of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// The extension answered the probe. Any non-error reply counts,
    /// even if the payload is not meaningful.
    Reachable,

    /// The host signalled a delivery error; the extension is absent or
    /// not responding.
    Unreachable,
}

// ============================================================================
// Transport
// ============================================================================

/// Adapter over the two channels to the wallet extension.
///
/// Implementations must be non-blocking: operations resolve through
/// futures and the broadcast subscription, never by blocking the caller.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a liveness probe to the extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvironmentUnsupported`](crate::Error::EnvironmentUnsupported)
    /// when the host lacks the extension-messaging capability.
    async fn ping(&self, extension_id: &ExtensionId) -> Result<Reachability>;

    /// Sends a structured request over the direct channel and resolves
    /// with the extension's reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) when the
    /// host signals a delivery failure.
    async fn send(&self, extension_id: &ExtensionId, payload: OutboundPayload)
    -> Result<DirectReply>;

    /// Subscribes to out-of-band messages from the extension.
    ///
    /// Only messages carrying the expected envelope tag reach the
    /// receiver; other traffic is filtered by the transport.
    fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage>;
}
