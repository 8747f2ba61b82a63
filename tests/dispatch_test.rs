//! Inbound dispatch edge cases: argument widening, malformed frames,
//! and failing method bodies. Every error here must be contained inside
//! `update()`; the session survives all of it.

use std::any::Any;

use bytes::Bytes;
use crosswire_net::transport::{MemoryHub, MemoryTransport};
use crosswire_net::{Entity, EntityType, InvokeError, NetworkManager, RpcContext, TypeRegistry};
use crosswire_protocol::frame;
use crosswire_protocol::rpc::{ParamType, RpcDescriptor, RpcFrame};
use crosswire_protocol::transport::Transport;
use crosswire_protocol::value::ArgValue;
use crosswire_protocol::DeliveryMode;

#[derive(Default)]
struct Probe {
    marks: Vec<i64>,
    ratios: Vec<f64>,
}

impl Probe {
    fn mark(&mut self, ctx: &mut RpcContext<'_>, value: i64) {
        if ctx.route("mark", &[ArgValue::I64(value)]) {
            return;
        }
        self.marks.push(value);
    }

    fn rate(&mut self, ctx: &mut RpcContext<'_>, ratio: f64) {
        if ctx.route("rate", &[ArgValue::F64(ratio)]) {
            return;
        }
        self.ratios.push(ratio);
    }

    fn explode(&mut self, ctx: &mut RpcContext<'_>) -> Result<(), InvokeError> {
        if ctx.route("explode", &[]) {
            return Ok(());
        }
        Err(InvokeError::Failed("boom".to_string()))
    }
}

impl Entity for Probe {
    fn invoke(
        &mut self,
        ctx: &mut RpcContext<'_>,
        method: &str,
        args: &[ArgValue],
    ) -> Result<(), InvokeError> {
        let bad_argument = |index| InvokeError::BadArgument {
            method: method.to_string(),
            index,
        };
        match method {
            "mark" => {
                let value = args
                    .first()
                    .and_then(ArgValue::as_i64)
                    .ok_or_else(|| bad_argument(0))?;
                self.mark(ctx, value);
                Ok(())
            }
            "rate" => {
                let ratio = args
                    .first()
                    .and_then(ArgValue::as_f64)
                    .ok_or_else(|| bad_argument(0))?;
                self.rate(ctx, ratio);
                Ok(())
            }
            "explode" => self.explode(ctx),
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

impl EntityType for Probe {
    const TYPE_NAME: &'static str = "test::Probe";

    fn descriptors() -> Vec<RpcDescriptor> {
        vec![
            RpcDescriptor::server_bound("mark", [ParamType::I64]).require_ownership(false),
            RpcDescriptor::server_bound("rate", [ParamType::F64]).require_ownership(false),
            RpcDescriptor::server_bound("explode", []).require_ownership(false),
        ]
    }
}

struct Rig {
    server: NetworkManager<MemoryTransport>,
    rogue: MemoryTransport,
    id: u32,
}

/// Host plus a raw client endpoint and one spawned Probe.
fn rig() -> Rig {
    let hub = MemoryHub::new();
    let mut types = TypeRegistry::new();
    types.register::<Probe>();
    let mut server = NetworkManager::new(MemoryTransport::new(hub.clone()), types);
    server.start_server(7777).unwrap();

    let mut rogue = MemoryTransport::new(hub);
    rogue.start_client("localhost", 7777).unwrap();
    server.update();
    rogue.update();

    let id = server.spawn::<Probe>().unwrap();
    Rig { server, rogue, id }
}

fn send_rpc(rig: &mut Rig, method: &str, args: Vec<ArgValue>) {
    let frame = RpcFrame::new(method, rig.id, args).to_bytes().unwrap();
    rig.rogue.send_to_server(frame, DeliveryMode::Reliable);
}

#[test]
fn test_widening_i32_to_i64() {
    let mut rig = rig();
    send_rpc(&mut rig, "mark", vec![ArgValue::I32(41)]);
    send_rpc(&mut rig, "mark", vec![ArgValue::I8(-3)]);
    send_rpc(&mut rig, "mark", vec![ArgValue::I64(7)]);
    rig.server.update();
    assert_eq!(rig.server.entity::<Probe>(rig.id).unwrap().marks, vec![41, -3, 7]);
}

#[test]
fn test_widening_numeric_to_float() {
    let mut rig = rig();
    send_rpc(&mut rig, "rate", vec![ArgValue::F32(0.5)]);
    send_rpc(&mut rig, "rate", vec![ArgValue::U16(3)]);
    rig.server.update();
    assert_eq!(
        rig.server.entity::<Probe>(rig.id).unwrap().ratios,
        vec![0.5, 3.0]
    );
}

#[test]
fn test_narrowing_is_rejected() {
    let mut rig = rig();
    send_rpc(&mut rig, "mark", vec![ArgValue::U64(1)]); // cross-sign
    send_rpc(&mut rig, "mark", vec![ArgValue::Str("7".into())]);
    send_rpc(&mut rig, "mark", vec![ArgValue::Null]);
    rig.server.update();
    assert!(rig.server.entity::<Probe>(rig.id).unwrap().marks.is_empty());
}

#[test]
fn test_param_count_mismatch_is_dropped() {
    let mut rig = rig();
    send_rpc(&mut rig, "mark", vec![]);
    send_rpc(&mut rig, "mark", vec![ArgValue::I64(1), ArgValue::I64(2)]);
    rig.server.update();
    assert!(rig.server.entity::<Probe>(rig.id).unwrap().marks.is_empty());
}

#[test]
fn test_unknown_method_is_dropped() {
    let mut rig = rig();
    send_rpc(&mut rig, "vanish", vec![]);
    rig.server.update();
    assert!(rig.server.state().is_hosting());
}

#[test]
fn test_malformed_frames_are_consumed() {
    let mut rig = rig();
    // Truncated varint, unknown type tag, garbage bytes.
    rig.rogue
        .send_to_server(Bytes::from_static(&[0x80]), DeliveryMode::Reliable);
    let mut bad_tag = RpcFrame::new("mark", rig.id, vec![])
        .to_bytes()
        .unwrap()
        .to_vec();
    let idx = bad_tag.len() - 4;
    bad_tag[idx] = 1; // param count 1, but no value bytes
    rig.rogue
        .send_to_server(Bytes::from(bad_tag), DeliveryMode::Reliable);
    rig.rogue
        .send_to_server(Bytes::from_static(&[0x09, 0x41]), DeliveryMode::Reliable);

    rig.server.update();
    assert!(rig.server.state().is_hosting());
    assert!(rig.server.entity::<Probe>(rig.id).unwrap().marks.is_empty());

    // The session still dispatches valid frames afterwards.
    send_rpc(&mut rig, "mark", vec![ArgValue::I64(5)]);
    rig.server.update();
    assert_eq!(rig.server.entity::<Probe>(rig.id).unwrap().marks, vec![5]);
}

#[test]
fn test_failing_method_body_is_contained() {
    let mut rig = rig();
    send_rpc(&mut rig, "explode", vec![]);
    send_rpc(&mut rig, "mark", vec![ArgValue::I64(8)]);
    rig.server.update();
    // The failing invocation is logged and consumed; the next frame runs.
    assert_eq!(rig.server.entity::<Probe>(rig.id).unwrap().marks, vec![8]);
}

#[test]
fn test_handshake_ping_is_ignored() {
    let mut rig = rig();
    rig.rogue
        .send_to_server(frame::handshake_ping(), DeliveryMode::Reliable);
    rig.server.update();
    assert!(rig.server.state().is_hosting());
}
