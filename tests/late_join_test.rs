//! Late-joiner sync, spawn idempotence, and handshake ordering.

use std::any::Any;

use crosswire_net::transport::{MemoryHub, MemoryTransport};
use crosswire_net::{
    Entity, EntityType, InvokeError, NetEvent, NetworkManager, RpcContext, TypeRegistry,
};
use crosswire_protocol::frame::{self, SpawnFrame};
use crosswire_protocol::rpc::{ParamType, RpcDescriptor, RpcFrame};
use crosswire_protocol::transport::{Transport, TransportEvent};
use crosswire_protocol::value::ArgValue;
use crosswire_protocol::DeliveryMode;

#[derive(Default)]
struct Marker {
    spawn_calls: u32,
    tags: Vec<String>,
}

impl Marker {
    fn tag(&mut self, ctx: &mut RpcContext<'_>, label: String) {
        if ctx.route("tag", &[ArgValue::Str(label.clone())]) {
            return;
        }
        self.tags.push(label);
    }
}

impl Entity for Marker {
    fn invoke(
        &mut self,
        ctx: &mut RpcContext<'_>,
        method: &str,
        args: &[ArgValue],
    ) -> Result<(), InvokeError> {
        match method {
            "tag" => {
                let label = args
                    .first()
                    .and_then(ArgValue::as_str)
                    .ok_or_else(|| InvokeError::BadArgument {
                        method: method.to_string(),
                        index: 0,
                    })?
                    .to_string();
                self.tag(ctx, label);
                Ok(())
            }
            other => Err(InvokeError::UnknownMethod(other.to_string())),
        }
    }

    fn on_spawn(&mut self, _ctx: &mut RpcContext<'_>) {
        self.spawn_calls += 1;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityType for Marker {
    const TYPE_NAME: &'static str = "test::Marker";

    fn descriptors() -> Vec<RpcDescriptor> {
        vec![RpcDescriptor::client_bound("tag", [ParamType::Str])]
    }
}

fn make_manager(hub: &MemoryHub) -> NetworkManager<MemoryTransport> {
    let mut types = TypeRegistry::new();
    types.register::<Marker>();
    NetworkManager::new(MemoryTransport::new(hub.clone()), types)
}

#[test]
fn test_late_joiner_receives_spawns_in_order() {
    let hub = MemoryHub::new();
    let mut server = make_manager(&hub);
    server.start_server(7777).unwrap();

    let ids: Vec<u32> = (0..3).map(|_| server.spawn::<Marker>().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    // The client connects after all three spawns.
    let mut client = make_manager(&hub);
    client.start_client("localhost", 7777).unwrap();
    client.update();
    server.update();

    let events = client.update();
    assert_eq!(
        events,
        vec![
            NetEvent::ConnectedToServer { client_id: 1 },
            NetEvent::EntitySpawned(1),
            NetEvent::EntitySpawned(2),
            NetEvent::EntitySpawned(3),
        ]
    );
    assert_eq!(client.object_ids(), vec![1, 2, 3]);

    // An rpc addressed to entity 2 lands on the right instance.
    server
        .with_entity_mut::<Marker, _>(2, |marker, ctx| marker.tag(ctx, "middle".to_string()))
        .unwrap();
    client.update();
    assert_eq!(client.entity::<Marker>(2).unwrap().tags, vec!["middle"]);
    assert!(client.entity::<Marker>(1).unwrap().tags.is_empty());
    assert!(client.entity::<Marker>(3).unwrap().tags.is_empty());
}

#[test]
fn test_spawn_frame_is_idempotent() {
    let hub = MemoryHub::new();
    let mut rogue_server = MemoryTransport::new(hub.clone());
    rogue_server.start_server(7878, 4).unwrap();

    let mut client = make_manager(&hub);
    client.start_client("localhost", 7878).unwrap();
    client.update();

    let events = rogue_server.update();
    let Some(TransportEvent::ClientConnected(peer)) = events.first().cloned() else {
        panic!("expected a connection, got {events:?}");
    };
    rogue_server.send_to_client(peer, frame::client_id_assignment(1), DeliveryMode::Reliable);

    let spawn = SpawnFrame::new("test::Marker", 9, 0).to_bytes();
    rogue_server.send_to_client(peer, spawn.clone(), DeliveryMode::Reliable);
    rogue_server.send_to_client(peer, spawn, DeliveryMode::Reliable);

    let events = client.update();
    let spawned = events
        .iter()
        .filter(|e| matches!(e, NetEvent::EntitySpawned(9)))
        .count();
    assert_eq!(spawned, 1, "duplicate spawn must be a no-op");
    assert_eq!(client.object_ids(), vec![9]);
    assert_eq!(client.entity::<Marker>(9).unwrap().spawn_calls, 1);
}

#[test]
fn test_unknown_spawn_type_is_dropped() {
    let hub = MemoryHub::new();
    let mut rogue_server = MemoryTransport::new(hub.clone());
    rogue_server.start_server(7878, 4).unwrap();

    let mut client = make_manager(&hub);
    client.start_client("localhost", 7878).unwrap();
    client.update();

    let events = rogue_server.update();
    let Some(TransportEvent::ClientConnected(peer)) = events.first().cloned() else {
        panic!("expected a connection, got {events:?}");
    };
    rogue_server.send_to_client(peer, frame::client_id_assignment(1), DeliveryMode::Reliable);
    rogue_server.send_to_client(
        peer,
        SpawnFrame::new("test::DoesNotExist", 4, 0).to_bytes(),
        DeliveryMode::Reliable,
    );

    client.update();
    assert!(client.object_ids().is_empty());
}

#[test]
fn test_assignment_precedes_addressed_rpcs() {
    let hub = MemoryHub::new();
    let mut server = make_manager(&hub);
    server.start_server(7777).unwrap();

    let mut client = make_manager(&hub);
    client.start_client("localhost", 7777).unwrap();
    client.update();
    server.update();

    // In the same host tick: spawn and immediately broadcast an rpc.
    let id = server.spawn::<Marker>().unwrap();
    server
        .with_entity_mut::<Marker, _>(id, |marker, ctx| marker.tag(ctx, "first".to_string()))
        .unwrap();

    // The client drains assignment, spawn, and rpc in one update, in
    // exactly that order.
    let events = client.update();
    assert_eq!(events[0], NetEvent::ConnectedToServer { client_id: 1 });
    assert_eq!(events[1], NetEvent::EntitySpawned(id));
    assert_eq!(client.entity::<Marker>(id).unwrap().tags, vec!["first"]);
    assert_eq!(client.entity::<Marker>(id).unwrap().spawn_calls, 1);
}

#[test]
fn test_client_ids_are_monotonic() {
    let hub = MemoryHub::new();
    let mut server = make_manager(&hub);
    server.start_server(7777).unwrap();

    let mut first = make_manager(&hub);
    let mut second = make_manager(&hub);
    first.start_client("localhost", 7777).unwrap();
    first.update();
    server.update();
    second.start_client("localhost", 7777).unwrap();
    second.update();
    server.update();

    assert_eq!(
        first.update(),
        vec![NetEvent::ConnectedToServer { client_id: 1 }]
    );
    assert_eq!(
        second.update(),
        vec![NetEvent::ConnectedToServer { client_id: 2 }]
    );

    // A dropped client never frees its id for reuse.
    drop(first);
    server.update();
    let mut third = make_manager(&hub);
    third.start_client("localhost", 7777).unwrap();
    third.update();
    server.update();
    assert_eq!(
        third.update(),
        vec![NetEvent::ConnectedToServer { client_id: 3 }]
    );
}

#[test]
fn test_rpc_for_unregistered_entity_is_dropped() {
    let hub = MemoryHub::new();
    let mut server = make_manager(&hub);
    server.start_server(7777).unwrap();

    let mut rogue = MemoryTransport::new(hub.clone());
    rogue.start_client("localhost", 7777).unwrap();
    server.update();
    rogue.update();

    let frame = RpcFrame::new("tag", 77, vec![ArgValue::Str("x".into())])
        .to_bytes()
        .unwrap();
    rogue.send_to_server(frame, DeliveryMode::Reliable);
    // Consumed without effect; the session stays up.
    server.update();
    assert!(server.state().is_hosting());
}
