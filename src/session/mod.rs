//! Session orchestration.
//!
//! A [`Session`] owns the detection → request → grant/deny sequence:
//! it schedules detection after a settle delay, tracks whether a request
//! is in flight, exposes `request_access`/`disconnect` as idempotent
//! imperative entry points, and notifies the configured hook exactly
//! once per connect/disconnect transition.
//!
//! Sessions are constructed explicitly through [`SessionBuilder`];
//! there is no ambient singleton. Using a handle after shutdown is a
//! typed usage error.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Builder and configuration validation |
//! | `controller` | Session handle and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Builder pattern for session configuration.
pub mod builder;

/// Session handle and event loop.
pub mod controller;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use controller::Session;
