//! # Crosswire Protocol
//!
//! Wire-level definitions for the Crosswire networked-object RPC core.
//!
//! This crate provides:
//! - `ArgValue`: the tagged parameter encoding for RPC arguments
//! - `RpcFrame` / `SpawnFrame`: the datagram formats for invocations and
//!   entity materialization
//! - frame discriminators and control-frame helpers (`frame`)
//! - `RpcDescriptor`: per-method metadata (kind, ownership, delivery)
//! - `DeliveryMode`: the three transport delivery semantics
//! - `Transport`: the poll-driven datagram transport contract
//! - Error types for encoding, decoding, and transports
//!
//! ## Example
//!
//! ```
//! use crosswire_protocol::rpc::RpcFrame;
//! use crosswire_protocol::value::ArgValue;
//!
//! // Encode an invocation of `ping_server(42)` on entity 1
//! let frame = RpcFrame::new("ping_server", 1, vec![ArgValue::I32(42)]);
//! let bytes = frame.to_bytes().unwrap();
//!
//! // Decode it back
//! let received = RpcFrame::from_bytes(bytes).unwrap();
//! assert_eq!(received.method, "ping_server");
//! assert_eq!(received.args, vec![ArgValue::I32(42)]);
//! ```

pub mod delivery;
pub mod error;
pub mod frame;
pub mod rpc;
pub mod transport;
pub mod value;
pub mod wire;

pub use delivery::DeliveryMode;
pub use error::{DecodeError, DecodeResult, EncodeError, TransportError};
pub use frame::SpawnFrame;
pub use rpc::{convert_arg, ParamType, RpcDescriptor, RpcFrame, RpcKind};
pub use transport::{PeerId, Transport, TransportEvent, SERVER_PEER};
pub use value::ArgValue;
