//! Error types for the NilData wallet connection client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use nildata_connect::{Result, Error};
//!
//! fn example(session: &Session) -> Result<()> {
//!     session.request_access()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Environment | [`Error::EnvironmentUnsupported`] |
//! | Transport | [`Error::Transport`], [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`] |
//! | Integration | [`Error::Usage`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Configuration and usage errors signal integration mistakes and are
/// surfaced to the caller as hard failures. Transport-level failures are
/// caught by the session and converted into status transitions.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid, e.g. an empty
    /// extension id. Fatal at initialization.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Environment Errors
    // ========================================================================
    /// Host lacks the extension-messaging capability.
    ///
    /// Returned when no bridge endpoint is available on this host. The
    /// session reports this as a terminal status with no retry path.
    #[error("Environment does not support extension messaging")]
    EnvironmentUnsupported,

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Delivery failure reported by the host transport.
    ///
    /// Returned when the bridge signals that a request could not be
    /// delivered to the extension. User-retriable.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the delivery failure.
        message: String,
    },

    /// Bridge connection failed.
    ///
    /// Returned when the WebSocket connection to the content-script
    /// bridge cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Bridge connection closed unexpectedly.
    ///
    /// Returned when the connection is lost during operation.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation on an outbound message.
    ///
    /// Malformed inbound messages are ignored by the session rather than
    /// failing it; this variant covers outbound framing failures.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Integration Errors
    // ========================================================================
    /// Session surface accessed outside an active session.
    ///
    /// Returned when a handle is used after the session was shut down.
    /// Signals a caller bug, not a runtime condition.
    #[error("Usage error: {message}")]
    Usage {
        /// Description of the integration mistake.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a usage error.
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport-level failure.
    ///
    /// Transport failures are converted into status transitions and offer
    /// the user a retry affordance.
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
                | Self::ChannelClosed(_)
        )
    }

    /// Returns `true` if this is an unsupported-environment error.
    #[inline]
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::EnvironmentUnsupported)
    }

    /// Returns `true` if this error indicates an integration mistake.
    ///
    /// Fatal errors propagate to the caller instead of becoming status
    /// transitions.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Usage { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
