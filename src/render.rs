//! Presentation surface: state snapshots rendered to view descriptions.
//!
//! Rendering is a pure function of the connection state. The session
//! applies a [`Render`] strategy to each [`StateView`] snapshot; hosts
//! that want custom presentation supply their own strategy, otherwise
//! [`DefaultRender`] is used. No protocol logic lives here.

// ============================================================================
// Imports
// ============================================================================

use crate::state::{StateView, StatusKind};

// ============================================================================
// Constants
// ============================================================================

/// Default number of leading DID characters kept by truncation.
pub const DEFAULT_TRUNCATE_HEAD: usize = 20;

/// Default number of trailing DID characters kept by truncation.
pub const DEFAULT_TRUNCATE_TAIL: usize = 20;

/// Marker inserted between the head and tail of a truncated DID.
const ELLIPSIS: &str = "...";

// ============================================================================
// Action
// ============================================================================

/// Primary action offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Request access to the extension.
    RequestAccess,
    /// Disconnect from the extension.
    Disconnect,
}

// ============================================================================
// View
// ============================================================================

/// Renderable description of the current connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// Status message to display.
    pub message: String,
    /// Status kind, for styling.
    pub kind: StatusKind,
    /// The primary action for the current state.
    pub action: Action,
    /// Label for the action control.
    pub label: String,
    /// Whether the action control accepts input.
    pub enabled: bool,
    /// Whether the request control is shown.
    pub visible: bool,
    /// Truncated DID for display, absent while not granted.
    pub did_display: Option<String>,
}

// ============================================================================
// Render
// ============================================================================

/// Rendering strategy: `render(state) -> view`.
///
/// Implementations must be pure over the snapshot; the session may call
/// them at any time.
pub trait Render: Send + Sync {
    /// Renders a state snapshot into a view description.
    fn render(&self, state: &StateView) -> View;
}

// ============================================================================
// DefaultRender
// ============================================================================

/// Default rendering strategy.
///
/// Shows the request affordance until access is granted, then swaps in a
/// disconnect action with the truncated DID.
#[derive(Debug, Clone)]
pub struct DefaultRender {
    /// Leading DID characters kept by truncation.
    head: usize,
    /// Trailing DID characters kept by truncation.
    tail: usize,
}

impl Default for DefaultRender {
    fn default() -> Self {
        Self {
            head: DEFAULT_TRUNCATE_HEAD,
            tail: DEFAULT_TRUNCATE_TAIL,
        }
    }
}

impl DefaultRender {
    /// Creates a default renderer with standard truncation lengths.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets custom truncation head/tail lengths.
    #[inline]
    #[must_use]
    pub fn with_truncation(mut self, head: usize, tail: usize) -> Self {
        self.head = head;
        self.tail = tail;
        self
    }
}

impl Render for DefaultRender {
    fn render(&self, state: &StateView) -> View {
        let action = if state.connected {
            Action::Disconnect
        } else {
            Action::RequestAccess
        };

        let label = if state.connected {
            "Disconnect".to_string()
        } else {
            state.affordance.label.clone()
        };

        View {
            message: state.status.message.clone(),
            kind: state.status.kind,
            action,
            label,
            enabled: if state.connected {
                true
            } else {
                state.affordance.enabled
            },
            visible: state.affordance.visible,
            did_display: state
                .nillion_did
                .as_deref()
                .map(|did| truncate_did(did, self.head, self.tail)),
        }
    }
}

// ============================================================================
// Truncation
// ============================================================================

/// Truncates a DID for display.
///
/// Returns the full string when its length fits within `head + tail`,
/// else the first `head` characters, an ellipsis marker, and the last
/// `tail` characters. Counts characters, not bytes, so multi-byte input
/// cannot split a character.
#[must_use]
pub fn truncate_did(did: &str, head: usize, tail: usize) -> String {
    let count = did.chars().count();
    if count <= head + tail {
        return did.to_string();
    }

    let head_part: String = did.chars().take(head).collect();
    let tail_part: String = did.chars().skip(count - tail).collect();
    format!("{head_part}{ELLIPSIS}{tail_part}")
}

// ============================================================================
// Tests
// ============================================================================
