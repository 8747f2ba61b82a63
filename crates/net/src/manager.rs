//! Network manager: session lifecycle and inbound frame dispatch
//!
//! The manager owns the transport and composes the registry, the spawn
//! protocol, and the RPC interceptor. The application drives it with
//! `update()` once per tick from a single thread; every callback, registry
//! mutation, and outbound send happens on that thread.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use crate::entity::{CallOrigin, Entity, RpcContext};
use crate::error::NetError;
use crate::registry::{ObjectRegistry, TypeRegistry};
use crate::session::{Role, SessionState};
use crosswire_protocol::frame;
use crosswire_protocol::rpc::{convert_arg, RpcFrame, RpcKind};
use crosswire_protocol::transport::{PeerId, Transport, TransportEvent};
use crosswire_protocol::DeliveryMode;

/// Client id of the host itself.
pub const HOST_CLIENT_ID: u32 = 0;

/// Default client capacity for `start_server`.
pub const DEFAULT_MAX_CLIENTS: usize = 32;

/// Session-level events surfaced from `update()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// A client finished connecting and was assigned this id (host side).
    ClientConnected(u32),

    /// A client dropped (host side).
    ClientDisconnected(u32),

    /// The handshake completed and this peer was assigned a client id.
    ConnectedToServer { client_id: u32 },

    /// The connection to the server was lost.
    DisconnectedFromServer,

    /// An entity was registered locally, by `spawn` or by a spawn frame.
    EntitySpawned(u32),
}

/// Host-side record of one connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub client_id: u32,
    pub peer: PeerId,
    pub connected: bool,
}

/// The networked-object session driver.
///
/// One manager per process side: `start_server` makes it the
/// authoritative host, `start_client` a connecting client. All entity
/// types a session can spawn must be registered in the `TypeRegistry`
/// handed to `new` before the session starts.
pub struct NetworkManager<T: Transport> {
    pub(crate) transport: T,
    pub(crate) types: TypeRegistry,
    pub(crate) objects: ObjectRegistry,
    pub(crate) state: SessionState,
    pub(crate) local_client_id: u32,
    pub(crate) clients: BTreeMap<u32, ClientRecord>,
    pub(crate) peers: HashMap<PeerId, u32>,
    pub(crate) next_client_id: u32,
    pub(crate) next_object_id: u32,
    pub(crate) events: Vec<NetEvent>,
}

impl<T: Transport> NetworkManager<T> {
    pub fn new(transport: T, types: TypeRegistry) -> Self {
        Self {
            transport,
            types,
            objects: ObjectRegistry::new(),
            state: SessionState::Uninitialized,
            local_client_id: HOST_CLIENT_ID,
            clients: BTreeMap::new(),
            peers: HashMap::new(),
            next_client_id: 1,
            next_object_id: 1,
            events: Vec::new(),
        }
    }

    /// Starts hosting with the default client capacity.
    pub fn start_server(&mut self, port: u16) -> Result<(), NetError> {
        self.start_server_with(port, DEFAULT_MAX_CLIENTS)
    }

    pub fn start_server_with(&mut self, port: u16, max_clients: usize) -> Result<(), NetError> {
        if !self.state.is_uninitialized() {
            return Err(NetError::AlreadyStarted(self.state));
        }
        self.transport.start_server(port, max_clients)?;
        self.state.transition_to(SessionState::Hosting)?;
        self.local_client_id = HOST_CLIENT_ID;
        tracing::info!(port, max_clients, "server started");
        Ok(())
    }

    /// Starts connecting to `host:port`. The session becomes usable when
    /// the client-id assignment arrives (`NetEvent::ConnectedToServer`).
    pub fn start_client(&mut self, host: &str, port: u16) -> Result<(), NetError> {
        if !self.state.is_uninitialized() {
            return Err(NetError::AlreadyStarted(self.state));
        }
        self.transport.start_client(host, port)?;
        self.state.transition_to(SessionState::Connecting)?;
        tracing::info!(host, port, "connecting to server");
        Ok(())
    }

    /// Drains transport events, dispatches inbound frames, and returns
    /// the session events raised during this tick. All errors short of
    /// API misuse are contained here.
    pub fn update(&mut self) -> Vec<NetEvent> {
        for event in self.transport.update() {
            match event {
                TransportEvent::ClientConnected(peer) => self.handle_client_connected(peer),
                TransportEvent::ClientDisconnected(peer) => self.handle_client_disconnected(peer),
                TransportEvent::Data { bytes, sender } => self.handle_data(bytes, sender),
                TransportEvent::ConnectedToServer => self.handle_connected_to_server(),
                TransportEvent::DisconnectedFromServer => self.handle_disconnected_from_server(),
            }
        }
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// This peer's client id: 0 on the host and before the handshake.
    pub fn local_client_id(&self) -> u32 {
        self.local_client_id
    }

    pub fn client_ids(&self) -> Vec<u32> {
        self.clients
            .values()
            .filter(|c| c.connected)
            .map(|c| c.client_id)
            .collect()
    }

    pub fn object_ids(&self) -> Vec<u32> {
        self.objects.ids()
    }

    pub fn owner_of(&self, object_id: u32) -> Option<u32> {
        self.objects.get(object_id).map(|o| o.owner())
    }

    /// Typed shared view of a registered entity.
    pub fn entity<E: Entity>(&self, object_id: u32) -> Result<&E, NetError> {
        let object = self
            .objects
            .get(object_id)
            .ok_or(NetError::ObjectNotFound(object_id))?;
        object
            .entity::<E>()
            .ok_or(NetError::EntityTypeMismatch { object_id })
    }

    /// Runs `f` with mutable access to a registered entity and a routing
    /// context. This is the supported way to call RPC methods:
    ///
    /// ```ignore
    /// manager.with_entity_mut::<Player, _>(id, |player, ctx| {
    ///     player.ping_server(ctx, 42);
    /// })?;
    /// ```
    pub fn with_entity_mut<E: Entity, R>(
        &mut self,
        object_id: u32,
        f: impl FnOnce(&mut E, &mut RpcContext<'_>) -> R,
    ) -> Result<R, NetError> {
        let mut object = self
            .objects
            .take(object_id)
            .ok_or(NetError::ObjectNotFound(object_id))?;
        let owner = object.owner();
        let role = self.state.role();
        let local_client_id = self.local_client_id;
        let result = {
            let (entity, descriptors, rpc_cache) = object.split_mut();
            match entity.as_any_mut().downcast_mut::<E>() {
                Some(typed) => {
                    let mut ctx = RpcContext::new(
                        object_id,
                        owner,
                        local_client_id,
                        role,
                        CallOrigin::Local,
                        descriptors,
                        rpc_cache,
                        &mut self.transport,
                    );
                    Ok(f(typed, &mut ctx))
                }
                None => Err(NetError::EntityTypeMismatch { object_id }),
            }
        };
        self.objects.insert(object);
        result
    }

    /// Stops the session. Entities stay registered; id counters keep
    /// their values so a later session never reuses an id.
    pub fn stop(&mut self) {
        if self.state.is_uninitialized() {
            return;
        }
        self.transport.stop();
        self.clients.clear();
        self.peers.clear();
        self.local_client_id = HOST_CLIENT_ID;
        let _ = self.state.transition_to(SessionState::Uninitialized);
        tracing::info!("session stopped");
    }

    /// Full teardown: stops the session and clears all registered
    /// objects and pending events.
    pub fn dispose(&mut self) {
        self.stop();
        self.objects.clear();
        self.events.clear();
        self.next_object_id = 1;
        self.next_client_id = 1;
    }

    fn handle_client_connected(&mut self, peer: PeerId) {
        if !self.state.is_hosting() {
            tracing::debug!(peer, "ignoring client connect outside hosting state");
            return;
        }
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(
            client_id,
            ClientRecord {
                client_id,
                peer,
                connected: true,
            },
        );
        self.peers.insert(peer, client_id);
        self.events.push(NetEvent::ClientConnected(client_id));
        tracing::info!(client_id, peer, "client connected");

        // The assignment must be the first reliable frame this peer sees,
        // ahead of late-joiner sync and any user rpc.
        self.transport.send_to_client(
            peer,
            frame::client_id_assignment(client_id),
            DeliveryMode::Reliable,
        );
        self.late_joiner_sync(peer);
    }

    fn handle_client_disconnected(&mut self, peer: PeerId) {
        let Some(client_id) = self.peers.remove(&peer) else {
            tracing::debug!(peer, "disconnect from unknown peer");
            return;
        };
        if let Some(record) = self.clients.get_mut(&client_id) {
            record.connected = false;
        }
        self.events.push(NetEvent::ClientDisconnected(client_id));
        tracing::info!(client_id, peer, "client disconnected");
    }

    fn handle_connected_to_server(&mut self) {
        // Stay in Connecting: the session is established only once the
        // host assigns a client id.
        tracing::debug!("transport connected; awaiting client id assignment");
        self.transport
            .send_to_server(frame::handshake_ping(), DeliveryMode::Reliable);
    }

    fn handle_disconnected_from_server(&mut self) {
        if !self.state.is_client_side() {
            return;
        }
        self.local_client_id = HOST_CLIENT_ID;
        let _ = self.state.transition_to(SessionState::Uninitialized);
        self.events.push(NetEvent::DisconnectedFromServer);
        tracing::info!("disconnected from server");
    }

    fn handle_data(&mut self, bytes: Bytes, sender: PeerId) {
        if bytes.is_empty() {
            tracing::debug!(sender, "dropping empty datagram");
            return;
        }
        if self.state.is_client_side() {
            if let Some(client_id) = frame::parse_client_id_assignment(&bytes) {
                self.handle_client_id_assignment(client_id);
                return;
            }
        }
        if frame::is_handshake_ping(&bytes) {
            return;
        }
        if frame::is_spawn(&bytes) {
            self.handle_spawn_frame(bytes);
            return;
        }
        self.dispatch_rpc(bytes, sender);
    }

    fn handle_client_id_assignment(&mut self, client_id: u32) {
        if !self.state.is_connecting() {
            tracing::debug!(client_id, "ignoring duplicate client id assignment");
            return;
        }
        self.local_client_id = client_id;
        if self.state.transition_to(SessionState::Connected).is_ok() {
            self.events.push(NetEvent::ConnectedToServer { client_id });
            tracing::info!(client_id, "connected to server");
        }
    }

    fn dispatch_rpc(&mut self, bytes: Bytes, sender_peer: PeerId) {
        let frame = match RpcFrame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable rpc frame");
                return;
            }
        };
        let RpcFrame {
            method,
            object_id,
            args,
        } = frame;

        let role = self.state.role();
        let sender = match role {
            Role::Host => match self.peers.get(&sender_peer) {
                Some(&client_id) => client_id,
                None => {
                    tracing::debug!(peer = sender_peer, method, "rpc from unknown peer; dropping");
                    return;
                }
            },
            Role::Client => HOST_CLIENT_ID,
            Role::Disconnected => {
                tracing::debug!(method, "rpc while disconnected; dropping");
                return;
            }
        };

        let Some(object) = self.objects.get(object_id) else {
            tracing::debug!(object_id, method, "rpc target not registered; dropping");
            return;
        };
        let owner = object.owner();
        let descriptors = object.descriptors_arc();
        let Some(desc) = descriptors.iter().find(|d| d.name == method) else {
            tracing::debug!(object_id, method, "no rpc descriptor for method; dropping");
            return;
        };

        let role_matches = matches!(
            (desc.kind, role),
            (RpcKind::ServerBound, Role::Host) | (RpcKind::ClientBound, Role::Client)
        );
        if !role_matches {
            tracing::debug!(
                object_id,
                method,
                kind = %desc.kind,
                "rpc kind does not match local role; dropping"
            );
            return;
        }

        if desc.kind == RpcKind::ServerBound && desc.require_ownership && sender != owner {
            tracing::debug!(
                object_id,
                method,
                sender,
                owner,
                "ownership check failed; dropping"
            );
            return;
        }

        if args.len() != desc.params.len() {
            tracing::debug!(
                object_id,
                method,
                expected = desc.params.len(),
                got = args.len(),
                "parameter count mismatch; dropping"
            );
            return;
        }

        let mut converted = Vec::with_capacity(args.len());
        for (index, (value, target)) in args.into_iter().zip(desc.params.iter()).enumerate() {
            match convert_arg(value, *target, index) {
                Ok(value) => converted.push(value),
                Err(e) => {
                    tracing::warn!(object_id, method, error = %e, "argument conversion failed; dropping");
                    return;
                }
            }
        }

        let Some(mut object) = self.objects.take(object_id) else {
            return;
        };
        let result = {
            let (entity, descriptors, rpc_cache) = object.split_mut();
            let mut ctx = RpcContext::new(
                object_id,
                owner,
                self.local_client_id,
                role,
                CallOrigin::Remote { sender },
                descriptors,
                rpc_cache,
                &mut self.transport,
            );
            entity.invoke(&mut ctx, &method, &converted)
        };
        self.objects.insert(object);

        // The frame is consumed either way; a failing method body must
        // not take the session down.
        if let Err(e) = result {
            tracing::warn!(object_id, method, error = %e, "rpc invocation failed");
        }
    }

    pub(crate) fn fire_on_spawn(&mut self, object_id: u32) {
        let Some(mut object) = self.objects.take(object_id) else {
            return;
        };
        let owner = object.owner();
        let role = self.state.role();
        let local_client_id = self.local_client_id;
        {
            let (entity, descriptors, rpc_cache) = object.split_mut();
            let mut ctx = RpcContext::new(
                object_id,
                owner,
                local_client_id,
                role,
                CallOrigin::Local,
                descriptors,
                rpc_cache,
                &mut self.transport,
            );
            entity.on_spawn(&mut ctx);
        }
        self.objects.insert(object);
    }
}
