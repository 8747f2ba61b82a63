//! Session state machine for the network manager
//!
//! State transitions:
//! ```text
//! Uninitialized → Hosting                  (start_server)
//! Uninitialized → Connecting → Connected   (start_client, then 0x01)
//!       ↑             ↓            ↓
//!       └─────────────┴────────────┘
//!              (stop / disconnect)
//! ```
//!
//! A client stays in Connecting after the transport reports a connection;
//! only the host's client-id assignment frame completes the handshake.

use crate::error::NetError;

/// Session state of a network manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session running
    #[default]
    Uninitialized,

    /// Acting as the authoritative host
    Hosting,

    /// Transport connected, waiting for the client-id assignment
    Connecting,

    /// Client-id received, session fully established
    Connected,
}

/// Which side of the session this process currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
    Disconnected,
}

impl SessionState {
    /// Validates a state transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            // Starting a session
            (Uninitialized, Hosting) => true,
            (Uninitialized, Connecting) => true,

            // Client handshake completion
            (Connecting, Connected) => true,

            // Teardown from any active state
            (Hosting, Uninitialized) => true,
            (Connecting, Uninitialized) => true,
            (Connected, Uninitialized) => true,

            // Any state can stay in same state
            (a, b) if a == &b => true,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Attempts to transition to a new state
    pub fn transition_to(&mut self, next: SessionState) -> Result<(), NetError> {
        if self.can_transition_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(NetError::InvalidStateTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// The role this state implies. Connecting counts as disconnected:
    /// without a client id, ownership checks cannot be answered yet.
    pub fn role(&self) -> Role {
        match self {
            SessionState::Hosting => Role::Host,
            SessionState::Connected => Role::Client,
            SessionState::Uninitialized | SessionState::Connecting => Role::Disconnected,
        }
    }

    #[inline]
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, SessionState::Uninitialized)
    }

    #[inline]
    pub fn is_hosting(&self) -> bool {
        matches!(self, SessionState::Hosting)
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(self, SessionState::Connecting)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// True on the client side of a session, whether or not the
    /// handshake has completed.
    #[inline]
    pub fn is_client_side(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Connected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "Uninitialized"),
            SessionState::Hosting => write!(f, "Hosting"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
        }
    }
}
