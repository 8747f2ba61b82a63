//! Entity traits and the RPC interceptor
//!
//! Entities declare their RPC methods in a descriptor table and open each
//! RPC method body with a routing stub:
//!
//! ```ignore
//! fn ping_server(&mut self, ctx: &mut RpcContext<'_>, value: i32) {
//!     if ctx.route("ping_server", &[ArgValue::I32(value)]) {
//!         return;
//!     }
//!     // method body: runs wherever the decision table says it should
//! }
//! ```
//!
//! `route` applies the interception decision table: depending on the
//! method's kind and the local role, the call either runs locally, is
//! encoded and sent to the server, or is broadcast to all clients before
//! running locally. When the manager dispatches a frame that arrived from
//! the network it lends the entity a remote-origin context, for which
//! `route` is a no-op (role and ownership gates were already applied at
//! dispatch), so the same stub is correct on the calling peer and on the
//! receiving peer.

use std::any::Any;
use std::collections::HashMap;

use thiserror::Error;

use crate::session::Role;
use crosswire_protocol::rpc::{RpcDescriptor, RpcFrame, RpcKind};
use crosswire_protocol::transport::Transport;
use crosswire_protocol::value::ArgValue;
use crosswire_protocol::DeliveryMode;

/// A networked entity.
///
/// `invoke` is the hand-written dispatcher stub: it matches the method
/// name, extracts typed arguments, and calls the corresponding method.
/// The manager invokes it for frames that arrived from the network, after
/// role, ownership, and parameter conversion checks.
pub trait Entity: Any {
    /// Dispatches a decoded invocation to the named method.
    fn invoke(
        &mut self,
        ctx: &mut RpcContext<'_>,
        method: &str,
        args: &[ArgValue],
    ) -> Result<(), InvokeError>;

    /// Notification hook, fired once the entity is registered: on the
    /// host right after `spawn`, on peers when the spawn frame applies.
    fn on_spawn(&mut self, _ctx: &mut RpcContext<'_>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Statically known metadata of an entity type: the stable name the spawn
/// protocol replicates, and the RPC descriptor table built once per type.
pub trait EntityType: Entity + Default {
    /// Stable fully-qualified type name.
    const TYPE_NAME: &'static str;

    /// Declares every RPC method on the type.
    fn descriptors() -> Vec<RpcDescriptor>;
}

/// Error from an entity's dispatcher stub.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("No such method: {0}")]
    UnknownMethod(String),

    #[error("Bad argument {index} for {method}")]
    BadArgument { method: String, index: usize },

    #[error("Invocation failed: {0}")]
    Failed(String),
}

/// Where an invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOrigin {
    /// Application code called the method through the manager.
    Local,

    /// The manager is replaying a frame received from this client id.
    Remote { sender: u32 },
}

/// Per-call context the manager lends to an entity.
pub struct RpcContext<'a> {
    object_id: u32,
    owner: u32,
    local_client_id: u32,
    role: Role,
    origin: CallOrigin,
    descriptors: &'a [RpcDescriptor],
    rpc_cache: &'a mut HashMap<String, bool>,
    transport: &'a mut dyn Transport,
}

impl<'a> RpcContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        object_id: u32,
        owner: u32,
        local_client_id: u32,
        role: Role,
        origin: CallOrigin,
        descriptors: &'a [RpcDescriptor],
        rpc_cache: &'a mut HashMap<String, bool>,
        transport: &'a mut dyn Transport,
    ) -> Self {
        Self {
            object_id,
            owner,
            local_client_id,
            role,
            origin,
            descriptors,
            rpc_cache,
            transport,
        }
    }

    /// Id of the entity this call targets.
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    /// Client that owns the entity (0 = host).
    pub fn owner(&self) -> u32 {
        self.owner
    }

    /// This peer's client id (0 on the host, and until the handshake
    /// completes on a client).
    pub fn local_client_id(&self) -> u32 {
        self.local_client_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Client id the current invocation arrived from, for remote-origin
    /// calls.
    pub fn sender(&self) -> Option<u32> {
        match self.origin {
            CallOrigin::Remote { sender } => Some(sender),
            CallOrigin::Local => None,
        }
    }

    /// The interception decision. Returns true when the caller must
    /// suppress the method body.
    pub fn route(&mut self, method: &str, args: &[ArgValue]) -> bool {
        if matches!(self.origin, CallOrigin::Remote { .. }) {
            // Replaying a received frame: gates were applied at dispatch.
            return false;
        }
        if !self.is_rpc(method) {
            return false;
        }
        let Some(desc) = self.descriptors.iter().find(|d| d.name == method) else {
            return false;
        };

        // Ownership gate, before any emission. On the host it also stops
        // local execution of client-bound calls: the owner must initiate.
        if desc.require_ownership && self.local_client_id != self.owner {
            let applies = match desc.kind {
                RpcKind::ServerBound => true,
                RpcKind::ClientBound => self.role == Role::Host,
            };
            if applies {
                tracing::debug!(
                    method,
                    object_id = self.object_id,
                    owner = self.owner,
                    local_client_id = self.local_client_id,
                    "rpc suppressed: ownership required"
                );
                return true;
            }
        }

        match (desc.kind, self.role) {
            (RpcKind::ServerBound, Role::Host) => false,
            (RpcKind::ServerBound, Role::Client) => {
                self.emit(method, args, desc.delivery, true);
                true
            }
            (RpcKind::ServerBound, Role::Disconnected) => true,
            (RpcKind::ClientBound, Role::Host) => {
                self.emit(method, args, desc.delivery, false);
                false
            }
            (RpcKind::ClientBound, Role::Client) => false,
            (RpcKind::ClientBound, Role::Disconnected) => false,
        }
    }

    /// Method-name → is-rpc cache; short-circuits interception for
    /// methods called repeatedly on the same entity.
    fn is_rpc(&mut self, method: &str) -> bool {
        if let Some(&cached) = self.rpc_cache.get(method) {
            return cached;
        }
        let is_rpc = self.descriptors.iter().any(|d| d.name == method);
        self.rpc_cache.insert(method.to_string(), is_rpc);
        is_rpc
    }

    fn emit(&mut self, method: &str, args: &[ArgValue], mode: DeliveryMode, to_server: bool) {
        let frame = RpcFrame::new(method, self.object_id, args.to_vec());
        match frame.to_bytes() {
            Ok(bytes) => {
                if to_server {
                    self.transport.send_to_server(bytes, mode);
                } else {
                    self.transport.send_to_all(bytes, mode);
                }
            }
            Err(e) => {
                tracing::error!(method, error = %e, "failed to encode rpc frame");
            }
        }
    }
}
