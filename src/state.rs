//! Connection protocol state machine.
//!
//! The machine owns the connection status, the DID, and the derived
//! interaction affordance. It is the only writer of that state: transport
//! events and session actions are fed in as method calls, and the machine
//! answers with the notification to emit, if any.
//!
//! # States
//!
//! ```text
//! Detecting ──► Pending ──► AwaitingDecision ──► Granted ──► Disconnected
//!     │                          ▲    │
//!     ├──► Undetected            │    └──► Denied ──┐
//!     └──► Unsupported           └──────────────────┘ (retry)
//! ```
//!
//! Grant and deny can arrive over two independent channels (the direct
//! reply and the broadcast channel). Within one request cycle the first
//! authoritative signal wins; a disconnect invalidates the cycle so late
//! outcomes from before it cannot resurrect the connection.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, trace};

use crate::protocol::{BroadcastMessage, DirectReply};

// ============================================================================
// Status Messages
// ============================================================================

const MSG_NOT_DETECTED: &str = "Extension not detected - Please install the extension first";
const MSG_NOT_FOUND: &str = "Extension not found - Please install and reload page";
const MSG_UNSUPPORTED: &str = "Extension messaging is not supported on this host";
const MSG_DETECTED: &str = "Extension detected! Click to request access";
const MSG_REQUESTING: &str = "Requesting access... Extension popup will open shortly!";
const MSG_POPUP_OPENED: &str = "Extension popup opened - Please Allow or Deny the request";
const MSG_GRANTED: &str = "Access Granted! You can now use extension features";
const MSG_DENIED: &str = "Access Denied by user";
const MSG_SEND_FAILED: &str = "Failed to connect to extension";
const MSG_DISCONNECTED: &str = "Disconnected. Click to reconnect";

// ============================================================================
// Button Labels
// ============================================================================

const LABEL_CONNECT: &str = "Connect DID";
const LABEL_REQUESTING: &str = "Requesting...";
const LABEL_TRY_AGAIN: &str = "Try Again";
const LABEL_REQUEST_AGAIN: &str = "Request Again";

// ============================================================================
// StatusKind
// ============================================================================

/// Coarse connection status paired with a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Waiting on detection, a request, or a user decision.
    Pending,
    /// Access granted.
    Granted,
    /// Access denied, extension absent, or environment unsupported.
    Denied,
}

// ============================================================================
// Status
// ============================================================================

/// User-facing status: a message and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Human-readable status message.
    pub message: String,
    /// Status kind.
    pub kind: StatusKind,
}

impl Status {
    fn new(message: &str, kind: StatusKind) -> Self {
        Self {
            message: message.to_string(),
            kind,
        }
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Fine-grained protocol phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Probing for the extension.
    Detecting,
    /// Host lacks extension messaging. Terminal.
    Unsupported,
    /// Probe failed; extension absent. Terminal until a manual retry
    /// path re-triggers detection.
    Undetected,
    /// Extension detected, no request in flight.
    Pending,
    /// Access request sent; waiting on the user's decision.
    AwaitingDecision,
    /// Access granted.
    Granted,
    /// Access denied; retry available.
    Denied,
    /// Disconnected by the user.
    Disconnected,
}

// ============================================================================
// Affordance
// ============================================================================

/// Derived state of the primary action control.
///
/// Fully determined by the protocol state; never independently settable.
/// `visible == false` only while access is granted, when a disconnect
/// affordance replaces the request control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordance {
    /// Button label.
    pub label: String,
    /// Whether the control accepts input.
    pub enabled: bool,
    /// Whether the request control is shown at all.
    pub visible: bool,
}

impl Affordance {
    fn new(label: &str, enabled: bool, visible: bool) -> Self {
        Self {
            label: label.to_string(),
            enabled,
            visible,
        }
    }
}

// ============================================================================
// ConnectionChange
// ============================================================================

/// Notification payload for the external connection-change hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionChange {
    /// Whether the session is now connected.
    pub connected: bool,
    /// DID exposed by the extension, if connected with one.
    pub nillion_did: Option<String>,
}

// ============================================================================
// StateView
// ============================================================================

/// Consistent snapshot of the connection state.
///
/// Handed to renderers and host code so reads do not observe a
/// half-applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateView {
    /// Current status.
    pub status: Status,
    /// Current DID, present only while granted.
    pub nillion_did: Option<String>,
    /// Whether access is granted.
    pub connected: bool,
    /// Derived action control state.
    pub affordance: Affordance,
    /// Fine-grained phase.
    pub phase: Phase,
}

// ============================================================================
// Machine
// ============================================================================

/// The protocol state machine.
///
/// Exclusively owns status, DID, and affordance. Callers request
/// transitions through the methods below; each returns the notification
/// to deliver, if the transition produced one.
#[derive(Debug)]
pub struct Machine {
    phase: Phase,
    status: Status,
    nillion_did: Option<String>,
    affordance: Affordance,
    connected: bool,
    in_flight: bool,
    decided: bool,
    cycle: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Machine - Construction & Accessors
// ============================================================================

impl Machine {
    /// Creates a machine in the initial detecting state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Detecting,
            status: Status::new(MSG_NOT_DETECTED, StatusKind::Pending),
            nillion_did: None,
            affordance: Affordance::new(LABEL_CONNECT, false, true),
            connected: false,
            in_flight: false,
            decided: false,
            cycle: 0,
        }
    }

    /// Returns the current request cycle.
    #[inline]
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns `true` if access is currently granted.
    #[inline]
    #[must_use]
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> StateView {
        StateView {
            status: self.status.clone(),
            nillion_did: self.nillion_did.clone(),
            connected: self.connected,
            affordance: self.affordance.clone(),
            phase: self.phase,
        }
    }
}

// ============================================================================
// Machine - Detection
// ============================================================================

impl Machine {
    /// Records a successful liveness probe.
    pub fn mark_detected(&mut self) {
        debug!("Extension detected");
        self.phase = Phase::Pending;
        self.status = Status::new(MSG_DETECTED, StatusKind::Pending);
        self.affordance = Affordance::new(LABEL_CONNECT, true, true);
    }

    /// Records a failed liveness probe. Terminal until a manual retry
    /// re-triggers detection.
    pub fn mark_unreachable(&mut self) {
        debug!("Extension unreachable");
        self.phase = Phase::Undetected;
        self.status = Status::new(MSG_NOT_FOUND, StatusKind::Denied);
        self.affordance = Affordance::new(LABEL_CONNECT, false, true);
    }

    /// Records an unsupported host environment. Terminal.
    pub fn mark_unsupported(&mut self) {
        debug!("Extension messaging unsupported");
        self.phase = Phase::Unsupported;
        self.status = Status::new(MSG_UNSUPPORTED, StatusKind::Denied);
        self.affordance = Affordance::new(LABEL_CONNECT, false, true);
    }
}

// ============================================================================
// Machine - Request Cycle
// ============================================================================

impl Machine {
    /// Starts a new access request cycle.
    ///
    /// Returns the cycle token to correlate the direct outcome with, or
    /// `None` when a request is already in flight or access is already
    /// granted (the call is then a no-op).
    pub fn begin_request(&mut self) -> Option<u64> {
        if self.in_flight || self.connected {
            trace!(
                in_flight = self.in_flight,
                connected = self.connected,
                "Ignoring re-entrant access request"
            );
            return None;
        }

        self.cycle += 1;
        self.in_flight = true;
        self.decided = false;
        self.phase = Phase::AwaitingDecision;
        self.status = Status::new(MSG_REQUESTING, StatusKind::Pending);
        self.affordance = Affordance::new(LABEL_REQUESTING, false, true);

        debug!(cycle = self.cycle, "Access request started");
        Some(self.cycle)
    }

    /// Applies the extension's direct reply for the given cycle.
    ///
    /// Stale outcomes (from a cycle that was superseded or already
    /// decided) are discarded.
    pub fn direct_reply(&mut self, cycle: u64, reply: &DirectReply) -> Option<ConnectionChange> {
        if cycle != self.cycle || self.decided {
            trace!(cycle, current = self.cycle, "Discarding stale direct reply");
            return None;
        }

        if reply.is_granted() {
            return self.grant(reply.nillion_did.clone());
        }

        if reply.is_popup_opened() {
            // Intermediate, non-terminal signal: message only, the
            // affordance is left untouched.
            debug!(cycle, "Popup opened, awaiting user decision");
            self.status = Status::new(MSG_POPUP_OPENED, StatusKind::Pending);
            return None;
        }

        self.deny(MSG_DENIED, LABEL_REQUEST_AGAIN, true)
    }

    /// Applies a host-level delivery failure for the given cycle.
    ///
    /// The failure becomes a denied status with a retry affordance; no
    /// connection-change notification fires since no decision was made.
    pub fn direct_failure(&mut self, cycle: u64) {
        if cycle != self.cycle || self.decided {
            trace!(cycle, current = self.cycle, "Discarding stale delivery failure");
            return;
        }

        debug!(cycle, "Access request delivery failed");
        self.deny(MSG_SEND_FAILED, LABEL_TRY_AGAIN, false);
    }

    /// Applies an out-of-band broadcast message.
    ///
    /// The broadcast channel is an authoritative grant/deny channel: the
    /// extension's approval popup may complete long after the direct
    /// reply resolved with only an acknowledgment. Unrecognized messages
    /// cause no transition.
    pub fn broadcast(&mut self, message: &BroadcastMessage) -> Option<ConnectionChange> {
        match message {
            BroadcastMessage::AccessResponse {
                granted: true,
                nillion_did,
            } => {
                if self.decided {
                    trace!("Cycle already decided, ignoring broadcast grant");
                    return None;
                }
                self.grant(nillion_did.clone())
            }

            BroadcastMessage::AccessResponse { granted: false, .. } | BroadcastMessage::Rejected => {
                if self.decided {
                    trace!("Cycle already decided, ignoring broadcast denial");
                    return None;
                }
                self.deny(MSG_DENIED, LABEL_REQUEST_AGAIN, true)
            }

            BroadcastMessage::Unknown { message_type } => {
                trace!(message_type, "Ignoring unrecognized broadcast message");
                None
            }
        }
    }

    /// Disconnects and resets to the reconnectable state.
    ///
    /// Only meaningful from the granted state but valid from any state
    /// as a hard reset; never fails. Invalidates the current request
    /// cycle so outcomes from before the disconnect are discarded.
    pub fn disconnect(&mut self) -> Option<ConnectionChange> {
        let was_connected = self.connected;

        self.cycle += 1;
        self.connected = false;
        self.nillion_did = None;
        self.in_flight = false;
        // The invalidated cycle stays decided until the next request
        // opens a fresh one; broadcasts carry no cycle on the wire, so
        // this is what discards the stale ones.
        self.decided = true;
        self.phase = Phase::Disconnected;
        self.status = Status::new(MSG_DISCONNECTED, StatusKind::Pending);
        self.affordance = Affordance::new(LABEL_CONNECT, true, true);

        debug!(was_connected, "Disconnected");

        was_connected.then_some(ConnectionChange {
            connected: false,
            nillion_did: None,
        })
    }
}

// ============================================================================
// Machine - Terminal Transitions
// ============================================================================

impl Machine {
    /// Applies a grant: stores the DID, hides the request affordance.
    fn grant(&mut self, nillion_did: Option<String>) -> Option<ConnectionChange> {
        self.connected = true;
        self.nillion_did = nillion_did.clone();
        self.in_flight = false;
        self.decided = true;
        self.phase = Phase::Granted;
        self.status = Status::new(MSG_GRANTED, StatusKind::Granted);
        self.affordance = Affordance::new(LABEL_CONNECT, false, false);

        debug!(has_did = self.nillion_did.is_some(), "Access granted");

        Some(ConnectionChange {
            connected: true,
            nillion_did,
        })
    }

    /// Applies a denial: re-enables the affordance with a retry label.
    fn deny(&mut self, message: &str, label: &str, notify: bool) -> Option<ConnectionChange> {
        self.connected = false;
        self.nillion_did = None;
        self.in_flight = false;
        self.decided = true;
        self.phase = Phase::Denied;
        self.status = Status::new(message, StatusKind::Denied);
        self.affordance = Affordance::new(label, true, true);

        debug!(message, "Access denied");

        notify.then_some(ConnectionChange {
            connected: false,
            nillion_did: None,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn granted_reply(did: Option<&str>) -> DirectReply {
        DirectReply {
            granted: Some(true),
            nillion_did: did.map(str::to_string),
            popup_opened: None,
        }
    }

    fn popup_reply() -> DirectReply {
        DirectReply {
            granted: None,
            nillion_did: None,
            popup_opened: Some(true),
        }
    }

    #[test]
    fn test_initial_state() {
        let machine = Machine::new();
        let view = machine.snapshot();

        assert_eq!(view.phase, Phase::Detecting);
        assert_eq!(view.status.kind, StatusKind::Pending);
        assert!(!view.affordance.enabled);
        assert!(view.affordance.visible);
        assert!(view.nillion_did.is_none());
        assert!(!view.connected);
    }

    #[test]
    fn test_probe_success_enables_affordance() {
        let mut machine = Machine::new();
        machine.mark_detected();

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Pending);
        assert_eq!(view.status.kind, StatusKind::Pending);
        assert!(view.status.message.contains("detected"));
        assert!(view.affordance.enabled);
    }

    #[test]
    fn test_probe_failure_keeps_affordance_disabled() {
        let mut machine = Machine::new();
        machine.mark_unreachable();

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Undetected);
        assert_eq!(view.status.kind, StatusKind::Denied);
        assert!(!view.affordance.enabled);
    }

    #[test]
    fn test_unsupported_is_terminal_denied() {
        let mut machine = Machine::new();
        machine.mark_unsupported();

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Unsupported);
        assert_eq!(view.status.kind, StatusKind::Denied);
        assert!(!view.affordance.enabled);
    }

    #[test]
    fn test_direct_grant_stores_did_and_notifies() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");

        let change = machine.direct_reply(cycle, &granted_reply(Some("did:nil:123")));

        assert_eq!(
            change,
            Some(ConnectionChange {
                connected: true,
                nillion_did: Some("did:nil:123".to_string()),
            })
        );

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Granted);
        assert_eq!(view.status.kind, StatusKind::Granted);
        assert_eq!(view.nillion_did.as_deref(), Some("did:nil:123"));
        assert!(!view.affordance.visible);
    }

    #[test]
    fn test_popup_opened_updates_message_only() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        let affordance_before = machine.snapshot().affordance;

        let change = machine.direct_reply(cycle, &popup_reply());

        assert!(change.is_none());
        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::AwaitingDecision);
        assert!(view.status.message.contains("popup opened"));
        assert_eq!(view.affordance, affordance_before);
    }

    #[test]
    fn test_popup_then_broadcast_denial() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        machine.direct_reply(cycle, &popup_reply());

        let change = machine.broadcast(&BroadcastMessage::AccessResponse {
            granted: false,
            nillion_did: None,
        });

        assert_eq!(
            change,
            Some(ConnectionChange {
                connected: false,
                nillion_did: None,
            })
        );

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Denied);
        assert!(view.affordance.enabled);
        assert_eq!(view.affordance.label, "Request Again");
    }

    #[test]
    fn test_broadcast_grant_is_authoritative() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        machine.direct_reply(cycle, &popup_reply());

        let change = machine.broadcast(&BroadcastMessage::AccessResponse {
            granted: true,
            nillion_did: Some("did:nil:late".to_string()),
        });

        assert_eq!(
            change,
            Some(ConnectionChange {
                connected: true,
                nillion_did: Some("did:nil:late".to_string()),
            })
        );
        assert_eq!(machine.snapshot().phase, Phase::Granted);
    }

    #[test]
    fn test_first_signal_wins_within_cycle() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");

        machine.direct_reply(cycle, &granted_reply(Some("did:nil:first")));

        // Contradicting broadcast for the same cycle is discarded
        let change = machine.broadcast(&BroadcastMessage::Rejected);
        assert!(change.is_none());

        let view = machine.snapshot();
        assert!(view.connected);
        assert_eq!(view.nillion_did.as_deref(), Some("did:nil:first"));
    }

    #[test]
    fn test_duplicate_grant_notifies_once() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");

        let first = machine.direct_reply(cycle, &granted_reply(Some("did:nil:1")));
        let second = machine.broadcast(&BroadcastMessage::AccessResponse {
            granted: true,
            nillion_did: Some("did:nil:1".to_string()),
        });

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_transport_failure_offers_retry_without_notification() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");

        machine.direct_failure(cycle);

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Denied);
        assert_eq!(view.affordance.label, "Try Again");
        assert!(view.affordance.enabled);
    }

    #[test]
    fn test_unknown_broadcast_causes_no_transition() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let before = machine.snapshot();

        let change = machine.broadcast(&BroadcastMessage::Unknown {
            message_type: "TELEMETRY".to_string(),
        });

        assert!(change.is_none());
        assert_eq!(machine.snapshot(), before);
    }

    #[test]
    fn test_reentrant_request_is_noop() {
        let mut machine = Machine::new();
        machine.mark_detected();

        assert!(machine.begin_request().is_some());
        assert!(machine.begin_request().is_none());
    }

    #[test]
    fn test_request_while_granted_is_noop() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        machine.direct_reply(cycle, &granted_reply(None));

        assert!(machine.begin_request().is_none());
    }

    #[test]
    fn test_disconnect_clears_did_and_notifies() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        machine.direct_reply(cycle, &granted_reply(Some("did:nil:123")));

        let change = machine.disconnect();

        assert_eq!(
            change,
            Some(ConnectionChange {
                connected: false,
                nillion_did: None,
            })
        );

        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Disconnected);
        assert!(view.nillion_did.is_none());
        assert!(view.affordance.enabled);
        assert!(view.affordance.visible);
        assert_eq!(view.affordance.label, "Connect DID");
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");
        machine.direct_reply(cycle, &granted_reply(Some("did:nil:123")));

        let first = machine.disconnect();
        let once = machine.snapshot();

        let second = machine.disconnect();
        let twice = machine.snapshot();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_disconnect_from_pending_is_silent_reset() {
        let mut machine = Machine::new();
        machine.mark_detected();

        let change = machine.disconnect();

        assert!(change.is_none());
        assert_eq!(machine.snapshot().phase, Phase::Disconnected);
    }

    #[test]
    fn test_disconnect_invalidates_in_flight_cycle() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let cycle = machine.begin_request().expect("request starts");

        machine.disconnect();

        // Late grant from before the disconnect is discarded
        let change = machine.direct_reply(cycle, &granted_reply(Some("did:nil:stale")));
        assert!(change.is_none());
        assert!(!machine.connected());
        assert!(machine.snapshot().nillion_did.is_none());
    }

    #[test]
    fn test_stale_broadcast_after_disconnect_is_discarded() {
        let mut machine = Machine::new();
        machine.mark_detected();
        machine.begin_request().expect("request starts");

        machine.disconnect();

        // Grant from the pre-disconnect cycle arrives late over the
        // broadcast channel; it must not reconnect.
        let change = machine.broadcast(&BroadcastMessage::AccessResponse {
            granted: true,
            nillion_did: Some("did:nil:stale".to_string()),
        });

        assert!(change.is_none());
        assert!(!machine.connected());
        let view = machine.snapshot();
        assert_eq!(view.phase, Phase::Disconnected);
        assert!(view.nillion_did.is_none());
    }

    #[test]
    fn test_request_after_disconnect_accepts_broadcast() {
        let mut machine = Machine::new();
        machine.mark_detected();
        machine.begin_request().expect("request starts");
        machine.disconnect();

        machine.begin_request().expect("reconnect starts");
        let change = machine.broadcast(&BroadcastMessage::AccessResponse {
            granted: true,
            nillion_did: Some("did:nil:fresh".to_string()),
        });

        assert!(change.is_some());
        assert!(machine.connected());
    }

    #[test]
    fn test_retry_after_denial() {
        let mut machine = Machine::new();
        machine.mark_detected();
        let first = machine.begin_request().expect("request starts");
        machine.broadcast(&BroadcastMessage::Rejected);

        let second = machine.begin_request().expect("retry starts");
        assert_ne!(first, second);

        let change = machine.direct_reply(second, &granted_reply(Some("did:nil:retry")));
        assert!(change.is_some());
        assert!(machine.connected());
    }

    // ========================================================================
    // Property Tests
    // ========================================================================

    /// Steps a machine can take, for property exploration.
    #[derive(Debug, Clone)]
    enum Step {
        Detected,
        Unreachable,
        Request,
        DirectGrant(Option<String>),
        DirectPopup,
        DirectDeny,
        DirectFailure,
        BroadcastGrant(Option<String>),
        BroadcastDeny,
        BroadcastUnknown,
        Disconnect,
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        let did = proptest::option::of("[a-z0-9:]{1,24}");
        prop_oneof![
            Just(Step::Detected),
            Just(Step::Unreachable),
            Just(Step::Request),
            did.clone().prop_map(Step::DirectGrant),
            Just(Step::DirectPopup),
            Just(Step::DirectDeny),
            Just(Step::DirectFailure),
            did.prop_map(Step::BroadcastGrant),
            Just(Step::BroadcastDeny),
            Just(Step::BroadcastUnknown),
            Just(Step::Disconnect),
        ]
    }

    fn apply(machine: &mut Machine, step: Step) {
        let cycle = machine.cycle();
        match step {
            Step::Detected => machine.mark_detected(),
            Step::Unreachable => machine.mark_unreachable(),
            Step::Request => {
                machine.begin_request();
            }
            Step::DirectGrant(did) => {
                machine.direct_reply(
                    cycle,
                    &DirectReply {
                        granted: Some(true),
                        nillion_did: did,
                        popup_opened: None,
                    },
                );
            }
            Step::DirectPopup => {
                machine.direct_reply(cycle, &popup_reply());
            }
            Step::DirectDeny => {
                machine.direct_reply(cycle, &DirectReply::default());
            }
            Step::DirectFailure => machine.direct_failure(cycle),
            Step::BroadcastGrant(did) => {
                machine.broadcast(&BroadcastMessage::AccessResponse {
                    granted: true,
                    nillion_did: did,
                });
            }
            Step::BroadcastDeny => {
                machine.broadcast(&BroadcastMessage::AccessResponse {
                    granted: false,
                    nillion_did: None,
                });
            }
            Step::BroadcastUnknown => {
                machine.broadcast(&BroadcastMessage::Unknown {
                    message_type: "NOISE".to_string(),
                });
            }
            Step::Disconnect => {
                machine.disconnect();
            }
        }
    }

    proptest! {
        /// DID is non-null only while status is granted, for every
        /// sequence of transport and session events.
        #[test]
        fn prop_did_implies_granted(steps in proptest::collection::vec(step_strategy(), 0..64)) {
            let mut machine = Machine::new();
            for step in steps {
                apply(&mut machine, step);
                let view = machine.snapshot();
                if view.nillion_did.is_some() {
                    prop_assert_eq!(view.status.kind, StatusKind::Granted);
                    prop_assert!(view.connected);
                }
            }
        }

        /// A hidden request affordance implies granted status.
        #[test]
        fn prop_hidden_affordance_implies_granted(
            steps in proptest::collection::vec(step_strategy(), 0..64)
        ) {
            let mut machine = Machine::new();
            for step in steps {
                apply(&mut machine, step);
                let view = machine.snapshot();
                if !view.affordance.visible {
                    prop_assert_eq!(view.status.kind, StatusKind::Granted);
                }
            }
        }
    }
}
