//! Host and client in one process over the memory transport: the client
//! sends a server-bound ping, the host answers with a client-bound pong.
//!
//! Run with: `cargo run --example echo`

use std::any::Any;

use crosswire::net::transport::{MemoryHub, MemoryTransport};
use crosswire::net::{Entity, EntityType, InvokeError, NetworkManager, RpcContext, TypeRegistry};
use crosswire::protocol::rpc::{ParamType, RpcDescriptor};
use crosswire::protocol::value::ArgValue;

#[derive(Default)]
struct Beacon {
    pings: Vec<i32>,
    pongs: Vec<i32>,
}

impl Beacon {
    fn ping_server(&mut self, ctx: &mut RpcContext<'_>, value: i32) {
        if ctx.route("ping_server", &[ArgValue::I32(value)]) {
            return;
        }
        println!("[host] ping {value} from client {:?}", ctx.sender());
        self.pings.push(value);
    }

    fn pong_clients(&mut self, ctx: &mut RpcContext<'_>, value: i32) {
        if ctx.route("pong_clients", &[ArgValue::I32(value)]) {
            return;
        }
        println!(
            "[client {}] pong {value}",
            ctx.local_client_id()
        );
        self.pongs.push(value);
    }
}

impl Entity for Beacon {
    fn invoke(
        &mut self,
        ctx: &mut RpcContext<'_>,
        method: &str,
        args: &[ArgValue],
    ) -> Result<(), InvokeError> {
        let value = args
            .first()
            .and_then(ArgValue::as_i32)
            .ok_or_else(|| InvokeError::BadArgument {
                method: method.to_string(),
                index: 0,
            })?;
        match method {
            "ping_server" => {
                self.ping_server(ctx, value);
                Ok(())
            }
            "pong_clients" => {
                self.pong_clients(ctx, value);
                Ok(())
            }
            other => Err(InvokeError::UnknownMethod(other.to_string())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityType for Beacon {
    const TYPE_NAME: &'static str = "demo::Beacon";

    fn descriptors() -> Vec<RpcDescriptor> {
        vec![
            RpcDescriptor::server_bound("ping_server", [ParamType::I32]),
            RpcDescriptor::client_bound("pong_clients", [ParamType::I32]),
        ]
    }
}

fn make_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register::<Beacon>();
    types
}

fn main() {
    tracing_subscriber::fmt().init();

    let hub = MemoryHub::new();
    let mut host = NetworkManager::new(MemoryTransport::new(hub.clone()), make_types());
    let mut client = NetworkManager::new(MemoryTransport::new(hub.clone()), make_types());

    host.start_server(7777).expect("host start");
    client.start_client("localhost", 7777).expect("client start");

    // Handshake: connect, assign client id 1
    client.update();
    host.update();
    client.update();

    let beacon = host.spawn_for::<Beacon>(1).expect("spawn");
    client.update();

    client
        .with_entity_mut::<Beacon, _>(beacon, |b, ctx| b.ping_server(ctx, 42))
        .expect("ping");
    host.update();

    host.with_entity_mut::<Beacon, _>(beacon, |b, ctx| b.pong_clients(ctx, 43))
        .expect("pong");
    client.update();

    let received = &client.entity::<Beacon>(beacon).expect("beacon").pongs;
    println!("client saw pongs: {received:?}");
}
