//! Transport implementations bundled with the core.
//!
//! Real deployments plug a UDP transport in through the
//! [`crosswire_protocol::transport::Transport`] contract; the in-memory
//! transport here serves tests and single-process sessions.

pub mod memory;

pub use memory::{MemoryHub, MemoryTransport};
