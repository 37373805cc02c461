//! NilData Connect - handshake client for the NilData wallet extension.
//!
//! This library drives the detection and authorization handshake between a
//! host application and the NilData browser extension, tracking the
//! connection as an explicit state machine.
//!
//! # Architecture
//!
//! The handshake runs over two channels of a messaging bridge:
//!
//! - **Direct channel**: request/reply exchanges addressed to the extension
//!   (detection ping, access request)
//! - **Broadcast channel**: unsolicited messages relayed from the extension
//!   (deferred grant or denial after the user decides in the popup)
//!
//! Key design principles:
//!
//! - Each [`Session`] owns its state; no ambient singletons
//! - Outcomes are correlated to the request cycle that started them, so
//!   stale replies never overwrite a later decision
//! - The DID is held only while access is granted
//! - Presentation is a pure [`Render`] strategy over state snapshots
//!
//! # Quick Start
//!
//! ```no_run
//! use nildata_connect::{BridgeConnection, Session, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Locate the messaging bridge for this host
//!     let bridge = BridgeConnection::discover().await?;
//!
//!     // Start a session against the extension
//!     let session = Session::builder()
//!         .extension_id("abcdefghijklmnop")
//!         .origin("https://app.example")
//!         .on_connection_change(|change| {
//!             println!("connected: {}", change.connected);
//!         })
//!         .spawn(bridge)?;
//!
//!     // Ask the user for access; the outcome arrives asynchronously
//!     session.request_access()?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types (internal) |
//! | [`render`] | Presentation strategies over state snapshots |
//! | [`session`] | Session handle, builder, and event loop |
//! | [`state`] | Protocol state machine |
//! | [`transport`] | Messaging bridge transport |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types.
///
/// Internal module defining the direct and broadcast message structures.
pub mod protocol;

/// Presentation strategies.
///
/// Pure rendering of state snapshots into view descriptions.
pub mod render;

/// Session orchestration.
///
/// Use [`Session::builder()`] to configure and start a session.
pub mod session;

/// Protocol state machine.
///
/// Tracks detection, in-flight requests, and the granted/denied outcome.
pub mod state;

/// Messaging bridge transport.
///
/// The [`Transport`] trait and the WebSocket bridge implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ExtensionId, RequestId};

// Protocol types
pub use protocol::{BroadcastMessage, DirectReply};

// Render types
pub use render::{Action, DefaultRender, Render, View, truncate_did};

// Session types
pub use session::{Session, SessionBuilder};

// State types
pub use state::{
    Affordance, ConnectionChange, Machine, Phase, StateView, Status, StatusKind,
};

// Transport types
pub use transport::{BridgeConnection, Reachability, Transport};
