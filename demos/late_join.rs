//! Late-joiner sync: the host spawns entities before any client exists;
//! a client connecting afterwards materializes all of them in spawn
//! order and can be addressed immediately.
//!
//! Run with: `cargo run --example late_join`

use std::any::Any;

use crosswire::net::transport::{MemoryHub, MemoryTransport};
use crosswire::net::{
    Entity, EntityType, InvokeError, NetEvent, NetworkManager, RpcContext, TypeRegistry,
};
use crosswire::protocol::rpc::{ParamType, RpcDescriptor};
use crosswire::protocol::value::ArgValue;

#[derive(Default)]
struct Crate {
    label: Option<String>,
}

impl Crate {
    fn relabel(&mut self, ctx: &mut RpcContext<'_>, label: String) {
        if ctx.route("relabel", &[ArgValue::Str(label.clone())]) {
            return;
        }
        self.label = Some(label);
    }
}

impl Entity for Crate {
    fn invoke(
        &mut self,
        ctx: &mut RpcContext<'_>,
        method: &str,
        args: &[ArgValue],
    ) -> Result<(), InvokeError> {
        match method {
            "relabel" => {
                let label = args
                    .first()
                    .and_then(ArgValue::as_str)
                    .ok_or_else(|| InvokeError::BadArgument {
                        method: method.to_string(),
                        index: 0,
                    })?
                    .to_string();
                self.relabel(ctx, label);
                Ok(())
            }
            other => Err(InvokeError::UnknownMethod(other.to_string())),
        }
    }

    fn on_spawn(&mut self, ctx: &mut RpcContext<'_>) {
        println!(
            "[{}] crate {} materialized",
            if ctx.is_host() { "host" } else { "client" },
            ctx.object_id()
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityType for Crate {
    const TYPE_NAME: &'static str = "demo::Crate";

    fn descriptors() -> Vec<RpcDescriptor> {
        vec![RpcDescriptor::client_bound("relabel", [ParamType::Str])]
    }
}

fn make_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register::<Crate>();
    types
}

fn main() {
    tracing_subscriber::fmt().init();

    let hub = MemoryHub::new();
    let mut host = NetworkManager::new(MemoryTransport::new(hub.clone()), make_types());
    host.start_server(7777).expect("host start");

    for _ in 0..3 {
        host.spawn::<Crate>().expect("spawn");
    }

    let mut joiner = NetworkManager::new(MemoryTransport::new(hub.clone()), make_types());
    joiner.start_client("localhost", 7777).expect("client start");
    joiner.update();
    host.update();

    for event in joiner.update() {
        if let NetEvent::EntitySpawned(id) = event {
            println!("joiner synced entity {id}");
        }
    }

    host.with_entity_mut::<Crate, _>(2, |c, ctx| c.relabel(ctx, "medkits".to_string()))
        .expect("relabel");
    joiner.update();

    let label = joiner
        .entity::<Crate>(2)
        .expect("crate 2")
        .label
        .clone();
    println!("joiner sees crate 2 labeled {label:?}");
}
