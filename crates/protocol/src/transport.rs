//! Transport layer abstraction for Crosswire
//!
//! This module defines the Transport trait that lets the network manager
//! work with different datagram protocols (UDP, in-memory channels, etc.)
//! while keeping frame routing transport-agnostic.
//!
//! The contract is symmetric and poll-driven: the same trait serves host
//! and client endpoints, and `update()` drains pending events without
//! blocking. The manager calls it once per tick from the driver thread;
//! no method may suspend or lock internally across calls.

use bytes::Bytes;

use crate::delivery::DeliveryMode;
use crate::error::TransportError;

/// Transport-level peer handle, assigned by the transport when a client
/// connects. Distinct from the manager-assigned client id.
pub type PeerId = u64;

/// Peer id a client uses for frames arriving from its server.
pub const SERVER_PEER: PeerId = 0;

/// Events a transport surfaces from `update()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer completed a connection to this server endpoint.
    ClientConnected(PeerId),

    /// A previously connected peer dropped.
    ClientDisconnected(PeerId),

    /// One datagram, exactly as sent by the peer.
    Data { bytes: Bytes, sender: PeerId },

    /// The client endpoint reached its server. The session is not usable
    /// until the host's client-id assignment frame arrives.
    ConnectedToServer,

    /// The client endpoint lost its server.
    DisconnectedFromServer,
}

/// Datagram transport with three delivery modes.
///
/// Mode mapping: `Reliable` → reliable-ordered, `Unreliable` →
/// best-effort, `UnreliableSequenced` → sequenced-drop-old.
///
/// Send calls return once the frame is queued; they are silent no-ops
/// after `stop()` or before a session is started.
pub trait Transport {
    /// Opens a server endpoint accepting up to `max_clients` peers.
    fn start_server(&mut self, port: u16, max_clients: usize) -> Result<(), TransportError>;

    /// Opens a client endpoint toward `host:port`. The host identifier is
    /// opaque to the core and interpreted by the transport alone.
    fn start_client(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Non-blocking poll: drains and returns every pending event.
    fn update(&mut self) -> Vec<TransportEvent>;

    /// Queues a datagram to one connected peer (server endpoints only).
    fn send_to_client(&mut self, peer: PeerId, bytes: Bytes, mode: DeliveryMode);

    /// Queues a datagram to every connected peer (server endpoints only).
    fn send_to_all(&mut self, bytes: Bytes, mode: DeliveryMode);

    /// Queues a datagram to the server (client endpoints only).
    fn send_to_server(&mut self, bytes: Bytes, mode: DeliveryMode);

    /// Tears the endpoint down. Subsequent sends are no-ops.
    fn stop(&mut self);
}
