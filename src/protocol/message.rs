//! Broadcast-channel message types.
//!
//! Broadcast messages are unsolicited notifications from the extension's
//! content-script bridge. They arrive wrapped in an envelope tagged
//! `FROM_EXTENSION`; anything else on the channel is not extension
//! traffic and is dropped before parsing.
//!
//! The extension's approval popup completes asynchronously relative to
//! the original request, so the broadcast channel is an authoritative
//! grant/deny channel in its own right.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Envelope tag marking messages that originate from the extension.
pub const ENVELOPE_TAG: &str = "FROM_EXTENSION";

// ============================================================================
// Envelope
// ============================================================================

/// Broadcast envelope carrying an extension message.
///
/// # Format
///
/// ```json
/// {
///   "type": "FROM_EXTENSION",
///   "data": { "type": "ACCESS_RESPONSE", "granted": true, "nillionDiD": "did:nil:..." }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    /// Envelope tag; must equal [`ENVELOPE_TAG`].
    #[serde(rename = "type")]
    pub tag: String,

    /// Inner extension message.
    pub data: Value,
}

impl Envelope {
    /// Parses a broadcast frame, filtering out non-extension traffic.
    ///
    /// Returns `None` for frames that do not parse as an envelope or do
    /// not carry the expected tag.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        let envelope: Self = serde_json::from_str(text).ok()?;
        (envelope.tag == ENVELOPE_TAG).then_some(envelope)
    }

    /// Parses the inner payload into a typed [`BroadcastMessage`].
    #[must_use]
    pub fn message(&self) -> BroadcastMessage {
        BroadcastMessage::parse(&self.data)
    }
}

// ============================================================================
// BroadcastMessage
// ============================================================================

/// Typed extension message from the broadcast channel.
///
/// Disambiguated by the `type` discriminator before any other field is
/// trusted. Unrecognized types are preserved as [`BroadcastMessage::Unknown`]
/// so the session can ignore them without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastMessage {
    /// Outcome of an access request.
    AccessResponse {
        /// Whether access was granted.
        granted: bool,
        /// DID issued by the extension, attached on grant.
        nillion_did: Option<String>,
    },

    /// The user dismissed or rejected the request.
    Rejected,

    /// Unrecognized message type. Ignored, no transition.
    Unknown {
        /// The unrecognized `type` discriminator.
        message_type: String,
    },
}

impl BroadcastMessage {
    /// Parses an inner payload by its `type` discriminator.
    #[must_use]
    pub fn parse(data: &Value) -> Self {
        let message_type = data
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        match message_type {
            "ACCESS_RESPONSE" => Self::AccessResponse {
                granted: data
                    .get("granted")
                    .and_then(|v| v.as_bool())
                    .unwrap_or_default(),
                nillion_did: data
                    .get("nillionDiD")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },

            "REJECTED" => Self::Rejected,

            other => Self::Unknown {
                message_type: other.to_string(),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
