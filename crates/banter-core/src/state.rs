//! Connection lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle of one realtime connection.
///
/// Transitions are monotonic within a connection attempt: no path reaches
/// `Connected` without passing through `Connecting`. `Closed` is reachable
/// from any state because stopping a session is always legal; `Failed` is
/// reachable only from `Connecting` (an unrecoverable open failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, not yet started.
    Idle,
    /// Credential fetch and transport open in progress.
    Connecting,
    /// Transport open and channel attached.
    Connected,
    /// Transport dropped recoverably; subscription intent retained.
    Suspended,
    /// Explicitly stopped. Terminal.
    Closed,
    /// Unrecoverable open failure. Terminal.
    Failed,
}

impl ConnectionState {
    /// Check whether a transition to `next` is legal.
    #[must_use]
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Closed, Connected, Connecting, Failed, Idle, Suspended};
        match (self, next) {
            // stop() is legal (and idempotent) from any state
            (_, Closed) => true,
            (Idle, Connecting) => true,
            (Connecting, Connected | Failed) => true,
            (Connected, Suspended) => true,
            (Suspended, Connected) => true,
            _ => false,
        }
    }

    /// Check whether the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// Check whether a connection attempt or connection is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Suspended
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Suspended => "suspended",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{Closed, Connected, Connecting, Failed, Idle, Suspended};

    #[test]
    fn test_happy_path_transitions() {
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Connected));
    }

    #[test]
    fn test_no_skipping_connecting() {
        assert!(!Idle.can_transition_to(Connected));
        assert!(!Idle.can_transition_to(Suspended));
    }

    #[test]
    fn test_close_from_anywhere() {
        for state in [Idle, Connecting, Connected, Suspended, Closed, Failed] {
            assert!(state.can_transition_to(Closed), "{state} -> closed");
        }
    }

    #[test]
    fn test_failed_only_from_connecting() {
        assert!(Connecting.can_transition_to(Failed));
        assert!(!Connected.can_transition_to(Failed));
        assert!(!Suspended.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Closed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Suspended.is_terminal());
        assert!(Connected.is_active());
        assert!(!Closed.is_active());
    }
}
