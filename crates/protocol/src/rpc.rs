//! RPC frames and method descriptors
//!
//! An RPC frame is any datagram whose first byte is not one of the
//! control discriminators. Wire format:
//!
//! ```text
//! method name       : length-prefixed UTF-8 string
//! network object id : u32 LE
//! param count       : i32 LE
//! param[0..N-1]     : tagged values (see [`crate::value::ArgValue`])
//! ```
//!
//! Method names must stay under 255 bytes: a longer name's length prefix
//! would start with `0xFF` and collide with the spawn discriminator.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::delivery::DeliveryMode;
use crate::error::{DecodeError, DecodeResult, EncodeError};
use crate::value::ArgValue;
use crate::wire::{self, need};

/// Longest allowed encoded method name, exclusive.
pub const MAX_METHOD_NAME_LEN: usize = 255;

/// One RPC invocation on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcFrame {
    /// Declared method name on the target entity type.
    pub method: String,

    /// Target entity.
    pub object_id: u32,

    /// Decoded parameters, in declaration order.
    pub args: Vec<ArgValue>,
}

impl RpcFrame {
    pub fn new(method: impl Into<String>, object_id: u32, args: Vec<ArgValue>) -> Self {
        Self {
            method: method.into(),
            object_id,
            args,
        }
    }

    /// Serializes the frame.
    pub fn to_bytes(&self) -> Result<Bytes, EncodeError> {
        if self.method.len() >= MAX_METHOD_NAME_LEN {
            return Err(EncodeError::MethodNameTooLong(self.method.len()));
        }
        let mut buf = BytesMut::with_capacity(5 + self.method.len() + 8 + self.args.len() * 9);
        wire::put_string(&mut buf, &self.method);
        buf.put_u32_le(self.object_id);
        buf.put_i32_le(self.args.len() as i32);
        for arg in &self.args {
            arg.encode_into(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    /// Deserializes a frame. Any malformed field drops the whole frame.
    pub fn from_bytes(mut data: Bytes) -> DecodeResult<Self> {
        let method = wire::get_string(&mut data)?;
        need(&data, 8)?;
        let object_id = data.get_u32_le();
        let count = data.get_i32_le();
        if count < 0 {
            return Err(DecodeError::NegativeParamCount(count));
        }
        let mut args = Vec::new();
        for _ in 0..count {
            args.push(ArgValue::decode_from(&mut data)?);
        }
        Ok(Self {
            method,
            object_id,
            args,
        })
    }
}

/// Which direction a declared RPC travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcKind {
    /// Runs on the host; clients forward the call to the server.
    ServerBound,

    /// Runs on clients; the host broadcasts, then executes locally.
    ClientBound,
}

impl std::fmt::Display for RpcKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcKind::ServerBound => write!(f, "ServerBound"),
            RpcKind::ClientBound => write!(f, "ClientBound"),
        }
    }
}

/// Declared parameter type of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Str,
    Vec2,
    Vec3,
    Json,
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::U8 => "u8",
            ParamType::I8 => "i8",
            ParamType::I16 => "i16",
            ParamType::U16 => "u16",
            ParamType::I32 => "i32",
            ParamType::U32 => "u32",
            ParamType::I64 => "i64",
            ParamType::U64 => "u64",
            ParamType::F32 => "f32",
            ParamType::F64 => "f64",
            ParamType::Str => "string",
            ParamType::Vec2 => "vec2",
            ParamType::Vec3 => "vec3",
            ParamType::Json => "json",
        }
    }
}

/// Cached metadata for one RPC method.
///
/// Kind defaults differ: server-bound methods require ownership unless
/// opted out, client-bound methods do not. Both default to reliable
/// delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcDescriptor {
    pub name: String,
    pub kind: RpcKind,
    pub params: Vec<ParamType>,
    pub require_ownership: bool,
    pub delivery: DeliveryMode,
}

impl RpcDescriptor {
    /// Declares a server-bound method (`require_ownership = true`).
    pub fn server_bound(
        name: impl Into<String>,
        params: impl IntoIterator<Item = ParamType>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RpcKind::ServerBound,
            params: params.into_iter().collect(),
            require_ownership: true,
            delivery: DeliveryMode::Reliable,
        }
    }

    /// Declares a client-bound method (`require_ownership = false`).
    pub fn client_bound(
        name: impl Into<String>,
        params: impl IntoIterator<Item = ParamType>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: RpcKind::ClientBound,
            params: params.into_iter().collect(),
            require_ownership: false,
            delivery: DeliveryMode::Reliable,
        }
    }

    pub fn require_ownership(mut self, required: bool) -> Self {
        self.require_ownership = required;
        self
    }

    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.delivery = mode;
        self
    }
}

/// Converts a decoded argument to the declared parameter type.
///
/// Exact matches pass through. Otherwise a widening cast is attempted:
/// unsigned and signed integers widen within their own family, any
/// integer converts to float, and f32 widens to f64. Null passes for
/// string and JSON parameters. Anything else drops the frame as a
/// decode error.
pub fn convert_arg(value: ArgValue, target: ParamType, index: usize) -> DecodeResult<ArgValue> {
    use ArgValue as V;
    use ParamType as P;

    let converted = match (value, target) {
        (v @ V::Bool(_), P::Bool)
        | (v @ V::U8(_), P::U8)
        | (v @ V::I8(_), P::I8)
        | (v @ V::I16(_), P::I16)
        | (v @ V::U16(_), P::U16)
        | (v @ V::I32(_), P::I32)
        | (v @ V::U32(_), P::U32)
        | (v @ V::I64(_), P::I64)
        | (v @ V::U64(_), P::U64)
        | (v @ V::F32(_), P::F32)
        | (v @ V::F64(_), P::F64)
        | (v @ V::Str(_), P::Str)
        | (v @ V::Vec2(..), P::Vec2)
        | (v @ V::Vec3(..), P::Vec3)
        | (v @ V::Json { .. }, P::Json) => v,

        (V::Null, P::Str) | (V::Null, P::Json) => V::Null,

        // unsigned widenings
        (V::U8(v), P::U16) => V::U16(v as u16),
        (V::U8(v), P::U32) => V::U32(v as u32),
        (V::U8(v), P::U64) => V::U64(v as u64),
        (V::U16(v), P::U32) => V::U32(v as u32),
        (V::U16(v), P::U64) => V::U64(v as u64),
        (V::U32(v), P::U64) => V::U64(v as u64),

        // signed widenings
        (V::I8(v), P::I16) => V::I16(v as i16),
        (V::I8(v), P::I32) => V::I32(v as i32),
        (V::I8(v), P::I64) => V::I64(v as i64),
        (V::I16(v), P::I32) => V::I32(v as i32),
        (V::I16(v), P::I64) => V::I64(v as i64),
        (V::I32(v), P::I64) => V::I64(v as i64),

        // integer to float
        (V::U8(v), P::F32) => V::F32(v as f32),
        (V::U8(v), P::F64) => V::F64(v as f64),
        (V::I8(v), P::F32) => V::F32(v as f32),
        (V::I8(v), P::F64) => V::F64(v as f64),
        (V::U16(v), P::F32) => V::F32(v as f32),
        (V::U16(v), P::F64) => V::F64(v as f64),
        (V::I16(v), P::F32) => V::F32(v as f32),
        (V::I16(v), P::F64) => V::F64(v as f64),
        (V::U32(v), P::F32) => V::F32(v as f32),
        (V::U32(v), P::F64) => V::F64(v as f64),
        (V::I32(v), P::F32) => V::F32(v as f32),
        (V::I32(v), P::F64) => V::F64(v as f64),
        (V::U64(v), P::F32) => V::F32(v as f32),
        (V::U64(v), P::F64) => V::F64(v as f64),
        (V::I64(v), P::F32) => V::F32(v as f32),
        (V::I64(v), P::F64) => V::F64(v as f64),

        // float widening
        (V::F32(v), P::F64) => V::F64(v as f64),

        (value, target) => {
            return Err(DecodeError::ParamMismatch {
                index,
                found: value.kind(),
                expected: target.name(),
            })
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_frame_roundtrip() {
        let frame = RpcFrame::new(
            "ping_server",
            3,
            vec![ArgValue::I32(42), ArgValue::Str("hi".into()), ArgValue::Null],
        );
        let bytes = frame.to_bytes().unwrap();
        assert_eq!(RpcFrame::from_bytes(bytes).unwrap(), frame);
    }

    #[test]
    fn test_rpc_frame_no_args() {
        let frame = RpcFrame::new("reset", 1, vec![]);
        let bytes = frame.to_bytes().unwrap();
        let decoded = RpcFrame::from_bytes(bytes).unwrap();
        assert_eq!(decoded.args.len(), 0);
        assert_eq!(decoded.method, "reset");
    }

    #[test]
    fn test_rpc_frame_layout() {
        let frame = RpcFrame::new("ab", 1, vec![]);
        let bytes = frame.to_bytes().unwrap();
        // len prefix, "ab", object id LE, param count LE
        assert_eq!(&bytes[..], &[2, b'a', b'b', 1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_method_name_too_long() {
        let frame = RpcFrame::new("m".repeat(255), 1, vec![]);
        assert_eq!(
            frame.to_bytes(),
            Err(EncodeError::MethodNameTooLong(255))
        );
    }

    #[test]
    fn test_negative_param_count() {
        let mut buf = BytesMut::new();
        wire::put_string(&mut buf, "ping");
        buf.put_u32_le(1);
        buf.put_i32_le(-1);
        assert_eq!(
            RpcFrame::from_bytes(buf.freeze()),
            Err(DecodeError::NegativeParamCount(-1))
        );
    }

    #[test]
    fn test_truncated_args() {
        let frame = RpcFrame::new("ping", 1, vec![ArgValue::I64(9)]);
        let bytes = frame.to_bytes().unwrap();
        let truncated = bytes.slice(0..bytes.len() - 4);
        assert!(matches!(
            RpcFrame::from_bytes(truncated),
            Err(DecodeError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_descriptor_defaults() {
        let server = RpcDescriptor::server_bound("ping", [ParamType::I32]);
        assert_eq!(server.kind, RpcKind::ServerBound);
        assert!(server.require_ownership);
        assert_eq!(server.delivery, DeliveryMode::Reliable);

        let client = RpcDescriptor::client_bound("sync", []);
        assert_eq!(client.kind, RpcKind::ClientBound);
        assert!(!client.require_ownership);
        assert_eq!(client.delivery, DeliveryMode::Reliable);
    }

    #[test]
    fn test_descriptor_options() {
        let desc = RpcDescriptor::server_bound("shoot", [])
            .require_ownership(false)
            .delivery(DeliveryMode::UnreliableSequenced);
        assert!(!desc.require_ownership);
        assert_eq!(desc.delivery, DeliveryMode::UnreliableSequenced);
    }

    #[test]
    fn test_convert_exact_match() {
        let v = convert_arg(ArgValue::I32(5), ParamType::I32, 0).unwrap();
        assert_eq!(v, ArgValue::I32(5));
    }

    #[test]
    fn test_convert_widening() {
        assert_eq!(
            convert_arg(ArgValue::I32(5), ParamType::I64, 0).unwrap(),
            ArgValue::I64(5)
        );
        assert_eq!(
            convert_arg(ArgValue::U8(5), ParamType::U64, 0).unwrap(),
            ArgValue::U64(5)
        );
        assert_eq!(
            convert_arg(ArgValue::F32(1.5), ParamType::F64, 0).unwrap(),
            ArgValue::F64(1.5)
        );
        assert_eq!(
            convert_arg(ArgValue::I32(2), ParamType::F32, 0).unwrap(),
            ArgValue::F32(2.0)
        );
    }

    #[test]
    fn test_convert_null_for_reference_params() {
        assert_eq!(
            convert_arg(ArgValue::Null, ParamType::Str, 0).unwrap(),
            ArgValue::Null
        );
        assert_eq!(
            convert_arg(ArgValue::Null, ParamType::Json, 0).unwrap(),
            ArgValue::Null
        );
    }

    #[test]
    fn test_convert_rejects_narrowing_and_cross_sign() {
        assert!(convert_arg(ArgValue::I64(5), ParamType::I32, 0).is_err());
        assert!(convert_arg(ArgValue::U32(5), ParamType::I64, 1).is_err());
        assert!(convert_arg(ArgValue::F64(5.0), ParamType::F32, 0).is_err());
        assert!(convert_arg(ArgValue::Null, ParamType::I32, 0).is_err());
        assert!(convert_arg(ArgValue::Str("x".into()), ParamType::I32, 2).is_err());
    }
}
