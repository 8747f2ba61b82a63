use thiserror::Error;

use crate::session::SessionState;
use crosswire_protocol::TransportError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    #[error("Operation requires an active host session")]
    NotHost,

    #[error("Manager already started (state: {0})")]
    AlreadyStarted(SessionState),

    #[error("Invalid session state transition from {from} to {to}")]
    InvalidStateTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("No networked object with id {0}")]
    ObjectNotFound(u32),

    #[error("Networked object {object_id} is not of the requested type")]
    EntityTypeMismatch { object_id: u32 },

    #[error("Entity type {type_name} has an invalid rpc table: {reason}")]
    InvalidDescriptorTable { type_name: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for manager-level operations
pub type Result<T> = std::result::Result<T, NetError>;
