//! # Crosswire Net
//!
//! Networked-object runtime for the Crosswire RPC core.
//!
//! This crate provides:
//! - `Entity` / `EntityType`: the traits networked entity types implement
//! - `RpcContext`: the per-call interceptor entities route through
//! - `ObjectRegistry` / `TypeRegistry`: id → entity and name → factory maps
//! - `NetworkManager`: session lifecycle, spawn protocol, frame dispatch
//! - `SessionState`: the validated connection state machine
//! - `transport::MemoryTransport`: an in-process loopback transport
//!
//! A host spawns entities and broadcasts their creation; clients
//! materialize them from spawn frames and exchange RPCs with the host
//! according to each method's declared direction, ownership requirement,
//! and delivery mode.

pub mod entity;
pub mod error;
pub mod manager;
pub mod registry;
pub mod session;
pub mod spawn;
pub mod transport;

pub use entity::{CallOrigin, Entity, EntityType, InvokeError, RpcContext};
pub use error::NetError;
pub use manager::{
    ClientRecord, NetEvent, NetworkManager, DEFAULT_MAX_CLIENTS, HOST_CLIENT_ID,
};
pub use registry::{NetObject, ObjectRegistry, TypeRegistry};
pub use session::{Role, SessionState};
