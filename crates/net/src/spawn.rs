//! Spawn protocol: entity materialization across peers
//!
//! Spawning is server-initiated. The host assigns the next monotonic
//! object id, registers the entity, and broadcasts a reliable spawn
//! frame; connecting clients additionally receive one spawn frame per
//! live entity during late-joiner sync, in spawn order. Receipt is
//! idempotent, so replayed sync frames are harmless.

use crate::entity::EntityType;
use crate::error::NetError;
use crate::manager::{NetEvent, NetworkManager, HOST_CLIENT_ID};
use crate::registry::NetObject;
use crosswire_protocol::frame::SpawnFrame;
use crosswire_protocol::transport::{PeerId, Transport};
use crosswire_protocol::DeliveryMode;

impl<T: Transport> NetworkManager<T> {
    /// Spawns a host-owned entity. Host only.
    pub fn spawn<E: EntityType>(&mut self) -> Result<u32, NetError> {
        self.spawn_for::<E>(HOST_CLIENT_ID)
    }

    /// Spawns an entity owned by the given client. Host only; calling
    /// this anywhere else is an API misuse error surfaced to the caller.
    pub fn spawn_for<E: EntityType>(&mut self, owner: u32) -> Result<u32, NetError> {
        if !self.state.is_hosting() {
            return Err(NetError::NotHost);
        }
        let descriptors = self.objects.cache_descriptors::<E>()?;

        let object_id = self.next_object_id;
        self.next_object_id += 1;

        let object = NetObject::new(
            object_id,
            owner,
            E::TYPE_NAME.to_string(),
            Box::new(E::default()),
            descriptors,
        );
        self.objects.insert(object);

        let frame = SpawnFrame::new(E::TYPE_NAME, object_id, owner).to_bytes();
        self.transport.send_to_all(frame, DeliveryMode::Reliable);

        self.fire_on_spawn(object_id);
        self.events.push(NetEvent::EntitySpawned(object_id));
        tracing::info!(object_id, owner, type_name = E::TYPE_NAME, "spawned entity");
        Ok(object_id)
    }

    /// Tears an entity down locally. Host only. The frame discriminator
    /// set has no despawn message, so destruction is not replicated.
    pub fn despawn(&mut self, object_id: u32) -> Result<(), NetError> {
        if !self.state.is_hosting() {
            return Err(NetError::NotHost);
        }
        self.objects
            .remove(object_id)
            .ok_or(NetError::ObjectNotFound(object_id))?;
        tracing::info!(object_id, "despawned entity");
        Ok(())
    }

    /// Applies an inbound spawn frame on a client.
    pub(crate) fn handle_spawn_frame(&mut self, bytes: bytes::Bytes) {
        if self.state.is_hosting() {
            // Spawning is server-initiated; a spawn frame reaching the
            // host would let clients create entities.
            tracing::debug!("dropping spawn frame on host");
            return;
        }
        let frame = match SpawnFrame::from_bytes(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed spawn frame");
                return;
            }
        };
        if self.objects.contains(frame.object_id) {
            tracing::debug!(object_id = frame.object_id, "spawn already applied");
            return;
        }
        let Some(entity) = self.types.create(&frame.type_name) else {
            tracing::warn!(
                type_name = %frame.type_name,
                object_id = frame.object_id,
                "unknown entity type in spawn frame; dropping"
            );
            return;
        };
        let types = &self.types;
        let descriptors = match self.objects.cache_descriptors_named(&frame.type_name, || {
            types
                .descriptors_for(&frame.type_name)
                .unwrap_or_default()
        }) {
            Ok(descriptors) => descriptors,
            Err(e) => {
                tracing::error!(type_name = %frame.type_name, error = %e, "invalid rpc table; dropping spawn");
                return;
            }
        };

        let object = NetObject::new(
            frame.object_id,
            frame.owner,
            frame.type_name.clone(),
            entity,
            descriptors,
        );
        self.objects.insert(object);
        self.fire_on_spawn(frame.object_id);
        self.events.push(NetEvent::EntitySpawned(frame.object_id));
        tracing::info!(
            object_id = frame.object_id,
            owner = frame.owner,
            type_name = %frame.type_name,
            "entity spawned from frame"
        );
    }

    /// Replays every live entity's spawn frame to a newly connected
    /// peer, in spawn order, over the reliable channel. Runs after the
    /// client-id assignment so the client observes each spawn before any
    /// rpc addressed to it.
    pub(crate) fn late_joiner_sync(&mut self, peer: PeerId) {
        let frames: Vec<bytes::Bytes> = self
            .objects
            .iter()
            .map(|object| {
                SpawnFrame::new(object.type_name(), object.id(), object.owner()).to_bytes()
            })
            .collect();
        let count = frames.len();
        for frame in frames {
            self.transport
                .send_to_client(peer, frame, DeliveryMode::Reliable);
        }
        if count > 0 {
            tracing::debug!(peer, count, "late joiner sync complete");
        }
    }
}
