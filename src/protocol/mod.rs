//! Message types for the extension boundary.
//!
//! This module defines the two inbound/outbound channels to the wallet
//! extension:
//!
//! | Message Type | Channel | Direction | Purpose |
//! |--------------|---------|-----------|---------|
//! | [`DirectRequest`] | Direct | App → Extension | Probe or access request |
//! | [`DirectReply`] | Direct | Extension → App | Reply to a request |
//! | [`Envelope`] | Broadcast | Extension → App | Unsolicited notification |
//!
//! The direct channel is request/response addressed to a specific
//! extension and correlated by request id. The broadcast channel carries
//! unsolicited messages wrapped in a `FROM_EXTENSION` envelope.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `request` | Direct-channel requests and replies |
//! | `message` | Broadcast envelope and typed messages |

// ============================================================================
// Submodules
// ============================================================================

/// Direct-channel request and reply message types.
pub mod request;

/// Broadcast-channel message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{BroadcastMessage, ENVELOPE_TAG, Envelope};
pub use request::{DirectFrame, DirectReply, DirectRequest, OutboundPayload};
