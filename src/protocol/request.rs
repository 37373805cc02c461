//! Direct-channel request and reply message types.
//!
//! Defines the message format for the request/response channel addressed
//! to a specific extension: the liveness probe, the access request, and
//! the extension's direct reply.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::identifiers::{ExtensionId, RequestId};

// ============================================================================
// OutboundPayload
// ============================================================================

/// Payloads sent to the extension over the direct channel.
///
/// The `type` discriminator and field names are fixed by the extension's
/// message API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundPayload {
    /// Liveness probe. Any non-error reply signals presence.
    #[serde(rename = "PING")]
    Ping,

    /// Access request. Directs the extension to open its approval popup.
    #[serde(rename = "REQUEST_ACCESS")]
    RequestAccess {
        /// Origin of the requesting application.
        origin: String,
        /// Request creation time in epoch milliseconds.
        timestamp: u64,
        /// Explicit popup-open directive.
        #[serde(rename = "openPopup")]
        open_popup: bool,
    },
}

impl OutboundPayload {
    /// Creates an access request for the given origin, stamped with the
    /// current time.
    #[must_use]
    pub fn access_request(origin: impl Into<String>) -> Self {
        Self::RequestAccess {
            origin: origin.into(),
            timestamp: epoch_millis(),
            open_popup: true,
        }
    }
}

/// Returns the current time in epoch milliseconds.
fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ============================================================================
// DirectRequest
// ============================================================================

/// Framed direct-channel request.
///
/// Wraps an [`OutboundPayload`] with a correlation id and the target
/// extension id. The id lets the bridge route the extension's reply back
/// to the awaiting caller.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "extensionId": "abcdefgh",
///   "type": "REQUEST_ACCESS",
///   "origin": "https://app.example",
///   "timestamp": 1700000000000,
///   "openPopup": true
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct DirectRequest {
    /// Unique identifier for request/reply correlation.
    pub id: RequestId,

    /// Target extension id.
    #[serde(rename = "extensionId")]
    pub extension_id: ExtensionId,

    /// Payload with `type` discriminator and fields.
    #[serde(flatten)]
    pub payload: OutboundPayload,
}

impl DirectRequest {
    /// Creates a new request with an auto-generated id.
    #[inline]
    #[must_use]
    pub fn new(extension_id: ExtensionId, payload: OutboundPayload) -> Self {
        Self {
            id: RequestId::generate(),
            extension_id,
            payload,
        }
    }
}

// ============================================================================
// DirectReply
// ============================================================================

/// The extension's direct reply to an access request.
///
/// All fields are optional; the combination determines the transition:
///
/// | Shape | Meaning |
/// |-------|---------|
/// | `granted: true` | Access granted, DID may be attached |
/// | `popupOpened: true` (no decision) | Popup shown, decision pending |
/// | anything else | Denied |
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectReply {
    /// Whether access was granted.
    #[serde(default)]
    pub granted: Option<bool>,

    /// DID issued by the extension, attached on grant.
    #[serde(default, rename = "nillionDiD")]
    pub nillion_did: Option<String>,

    /// Whether the approval popup was opened without a decision yet.
    #[serde(default, rename = "popupOpened")]
    pub popup_opened: Option<bool>,
}

impl DirectReply {
    /// Returns `true` if the reply carries a grant decision.
    #[inline]
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.granted == Some(true)
    }

    /// Returns `true` if the reply only acknowledges that the popup opened.
    ///
    /// An intermediate, non-terminal signal: the user's decision arrives
    /// later via the broadcast channel.
    #[inline]
    #[must_use]
    pub fn is_popup_opened(&self) -> bool {
        !self.is_granted() && self.popup_opened == Some(true)
    }
}

// ============================================================================
// DirectFrame
// ============================================================================

/// Inbound frame on the direct channel.
///
/// The bridge tags replies with the originating request id. A present
/// `error` field reports a host-level delivery failure, the analogue of
/// the browser runtime's last-error signal.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectFrame {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Delivery failure reported by the host, if any.
    #[serde(default)]
    pub error: Option<String>,

    /// Reply fields from the extension.
    #[serde(flatten)]
    pub reply: DirectReply,
}

// ============================================================================
// Tests
// ============================================================================
