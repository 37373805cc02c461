//! Type-safe identifiers for the connection protocol.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile time.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ExtensionId`] | Addresses the extension over the direct channel |
//! | [`RequestId`] | Correlates a direct request with its reply |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// ExtensionId
// ============================================================================

/// Opaque handle addressing the wallet extension.
///
/// Immutable for the lifetime of a session. An empty id is a configuration
/// error and is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Creates an extension id, rejecting empty input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::config(
                "extension id is required. Use .extension_id() to set it.\n\
                 Example: Session::builder().extension_id(\"abcdefgh\")",
            ));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Unique identifier correlating a direct request with its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random request id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_id_rejects_empty() {
        assert!(ExtensionId::new("").is_err());
        assert!(ExtensionId::new("   ").is_err());
    }

    #[test]
    fn test_extension_id_valid() {
        let id = ExtensionId::new("abcdefghijklmnop").expect("valid id");
        assert_eq!(id.as_str(), "abcdefghijklmnop");
        assert_eq!(id.to_string(), "abcdefghijklmnop");
    }

    #[test]
    fn test_request_id_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_serde_roundtrip() {
        let id = RequestId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        let back: RequestId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }
}
