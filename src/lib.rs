//! # Crosswire
//!
//! A lightweight networked-object RPC core in the style of game-engine
//! netcode: declare entities, tag methods as server-bound or client-bound,
//! and let the manager route calls over a pluggable datagram transport.
//!
//! ## Components
//!
//! - `crosswire-protocol`: wire format, RPC descriptors, delivery modes,
//!   and the transport contract
//! - `crosswire-net`: entity registry, interception, spawn protocol, and
//!   the network manager
//!
//! ## Example
//!
//! See the `demos/` directory for runnable host/client sessions.

pub use crosswire_net as net;
pub use crosswire_protocol as protocol;
