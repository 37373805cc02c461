//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and starting a [`Session`].
//!
//! # Example
//!
//! ```no_run
//! use nildata_connect::{BridgeConnection, Session, Result};
//!
//! # async fn example() -> Result<()> {
//! let bridge = BridgeConnection::discover().await?;
//!
//! let session = Session::builder()
//!     .extension_id("abcdefghijklmnop")
//!     .origin("https://app.example")
//!     .auto_connect(true)
//!     .on_connection_change(|change| {
//!         println!("connected: {}", change.connected);
//!     })
//!     .spawn(bridge)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ExtensionId;
use crate::render::{DefaultRender, Render};
use crate::state::ConnectionChange;
use crate::transport::Transport;

use super::controller::{Session, SessionConfig};

// ============================================================================
// Types
// ============================================================================

/// Connection-change notification hook.
pub type ConnectionChangeHook = Box<dyn Fn(ConnectionChange) + Send + Sync>;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Extension id addressing the direct channel.
    extension_id: Option<String>,
    /// Origin reported in access requests.
    origin: Option<String>,
    /// Whether to request access automatically after detection.
    auto_connect: bool,
    /// Connection-change notification hook.
    on_connection_change: Option<ConnectionChangeHook>,
    /// Rendering strategy override.
    render: Option<Box<dyn Render>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("extension_id", &self.extension_id)
            .field("origin", &self.origin)
            .field("auto_connect", &self.auto_connect)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new session builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extension id. Required.
    #[inline]
    #[must_use]
    pub fn extension_id(mut self, id: impl Into<String>) -> Self {
        self.extension_id = Some(id.into());
        self
    }

    /// Sets the origin reported in access requests.
    ///
    /// Defaults to the opaque origin `"null"` when unset.
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Enables automatic access request after successful detection.
    #[inline]
    #[must_use]
    pub fn auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Sets the connection-change notification hook.
    ///
    /// Called exactly once per connect/disconnect transition.
    #[inline]
    #[must_use]
    pub fn on_connection_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(ConnectionChange) + Send + Sync + 'static,
    {
        self.on_connection_change = Some(Box::new(hook));
        self
    }

    /// Overrides the rendering strategy.
    ///
    /// Defaults to [`DefaultRender`] when unset.
    #[inline]
    #[must_use]
    pub fn render<R>(mut self, render: R) -> Self
    where
        R: Render + 'static,
    {
        self.render = Some(Box::new(render));
        self
    }

    /// Validates the configuration and starts the session.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the extension id is missing or empty
    /// - [`Error::Config`] if the origin does not parse as a URL
    pub fn spawn<T: Transport>(self, transport: T) -> Result<Session> {
        let extension_id = self.validate_extension_id()?;
        let origin = self.validate_origin()?;

        let config = SessionConfig {
            extension_id,
            origin,
            auto_connect: self.auto_connect,
            on_connection_change: self.on_connection_change,
            render: self.render.unwrap_or_else(|| Box::new(DefaultRender::new())),
        };

        Ok(Session::start(config, transport))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the extension id configuration.
    fn validate_extension_id(&self) -> Result<ExtensionId> {
        let id = self.extension_id.clone().ok_or_else(|| {
            Error::config(
                "extension id is required. Use .extension_id() to set it.\n\
                 Example: Session::builder().extension_id(\"abcdefgh\")",
            )
        })?;

        ExtensionId::new(id)
    }

    /// Validates the origin configuration.
    fn validate_origin(&self) -> Result<String> {
        let Some(origin) = self.origin.clone() else {
            // Opaque origin, matching how browsers serialize the absence
            // of a meaningful origin.
            return Ok("null".to_string());
        };

        let url = Url::parse(&origin)
            .map_err(|e| Error::config(format!("Invalid origin '{origin}': {e}")))?;

        Ok(url.origin().ascii_serialization())
    }
}

// ============================================================================
// Tests
// ============================================================================
