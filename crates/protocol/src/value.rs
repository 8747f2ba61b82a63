//! Tagged parameter values for RPC frames
//!
//! Each parameter on the wire is a single type tag followed by its value.
//! Tag 0 is a null value with no further bytes. Tags 1-14 are the closed
//! table of built-in scalar, string, and vector types. Tag 255 is the
//! JSON fallback for application-defined types: a length-prefixed type
//! name followed by a length-prefixed JSON document.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::error::{DecodeError, DecodeResult, EncodeError};
use crate::wire::{self, need};

/// Wire tag for a null parameter.
pub const TAG_NULL: u8 = 0;
/// Wire tag for the JSON fallback encoding.
pub const TAG_JSON: u8 = 255;

/// One RPC parameter, as carried on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    U8(u8),
    I8(i8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Vec2(f32, f32),
    Vec3(f32, f32, f32),
    /// Fallback for types outside the built-in table. Carries the stable
    /// type name and the decoded JSON document, so received values
    /// compare structurally.
    Json {
        type_name: String,
        value: serde_json::Value,
    },
}

impl ArgValue {
    /// Builds a JSON fallback value from any serializable type.
    pub fn json<T: Serialize>(
        type_name: impl Into<String>,
        value: &T,
    ) -> Result<Self, EncodeError> {
        let value = serde_json::to_value(value).map_err(|e| EncodeError::Json(e.to_string()))?;
        Ok(ArgValue::Json {
            type_name: type_name.into(),
            value,
        })
    }

    /// The wire tag this value encodes under.
    pub fn wire_tag(&self) -> u8 {
        match self {
            ArgValue::Null => TAG_NULL,
            ArgValue::Bool(_) => 1,
            ArgValue::U8(_) => 2,
            ArgValue::I8(_) => 3,
            ArgValue::I16(_) => 4,
            ArgValue::U16(_) => 5,
            ArgValue::I32(_) => 6,
            ArgValue::U32(_) => 7,
            ArgValue::I64(_) => 8,
            ArgValue::U64(_) => 9,
            ArgValue::F32(_) => 10,
            ArgValue::F64(_) => 11,
            ArgValue::Str(_) => 12,
            ArgValue::Vec2(..) => 13,
            ArgValue::Vec3(..) => 14,
            ArgValue::Json { .. } => TAG_JSON,
        }
    }

    /// Short name of the carried type, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "bool",
            ArgValue::U8(_) => "u8",
            ArgValue::I8(_) => "i8",
            ArgValue::I16(_) => "i16",
            ArgValue::U16(_) => "u16",
            ArgValue::I32(_) => "i32",
            ArgValue::U32(_) => "u32",
            ArgValue::I64(_) => "i64",
            ArgValue::U64(_) => "u64",
            ArgValue::F32(_) => "f32",
            ArgValue::F64(_) => "f64",
            ArgValue::Str(_) => "string",
            ArgValue::Vec2(..) => "vec2",
            ArgValue::Vec3(..) => "vec3",
            ArgValue::Json { .. } => "json",
        }
    }

    /// Appends the tag and value to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.wire_tag());
        match self {
            ArgValue::Null => {}
            ArgValue::Bool(v) => buf.put_u8(*v as u8),
            ArgValue::U8(v) => buf.put_u8(*v),
            ArgValue::I8(v) => buf.put_i8(*v),
            ArgValue::I16(v) => buf.put_i16_le(*v),
            ArgValue::U16(v) => buf.put_u16_le(*v),
            ArgValue::I32(v) => buf.put_i32_le(*v),
            ArgValue::U32(v) => buf.put_u32_le(*v),
            ArgValue::I64(v) => buf.put_i64_le(*v),
            ArgValue::U64(v) => buf.put_u64_le(*v),
            ArgValue::F32(v) => buf.put_f32_le(*v),
            ArgValue::F64(v) => buf.put_f64_le(*v),
            ArgValue::Str(v) => wire::put_string(buf, v),
            ArgValue::Vec2(x, y) => {
                buf.put_f32_le(*x);
                buf.put_f32_le(*y);
            }
            ArgValue::Vec3(x, y, z) => {
                buf.put_f32_le(*x);
                buf.put_f32_le(*y);
                buf.put_f32_le(*z);
            }
            ArgValue::Json { type_name, value } => {
                let doc =
                    serde_json::to_string(value).map_err(|e| EncodeError::Json(e.to_string()))?;
                wire::put_string(buf, type_name);
                wire::put_string(buf, &doc);
            }
        }
        Ok(())
    }

    /// Reads one tagged value. An unknown non-255 tag is a fatal decode
    /// error; the caller drops the whole frame.
    pub fn decode_from(buf: &mut impl Buf) -> DecodeResult<Self> {
        need(buf, 1)?;
        let tag = buf.get_u8();
        let value = match tag {
            TAG_NULL => ArgValue::Null,
            1 => {
                need(buf, 1)?;
                ArgValue::Bool(buf.get_u8() != 0)
            }
            2 => {
                need(buf, 1)?;
                ArgValue::U8(buf.get_u8())
            }
            3 => {
                need(buf, 1)?;
                ArgValue::I8(buf.get_i8())
            }
            4 => {
                need(buf, 2)?;
                ArgValue::I16(buf.get_i16_le())
            }
            5 => {
                need(buf, 2)?;
                ArgValue::U16(buf.get_u16_le())
            }
            6 => {
                need(buf, 4)?;
                ArgValue::I32(buf.get_i32_le())
            }
            7 => {
                need(buf, 4)?;
                ArgValue::U32(buf.get_u32_le())
            }
            8 => {
                need(buf, 8)?;
                ArgValue::I64(buf.get_i64_le())
            }
            9 => {
                need(buf, 8)?;
                ArgValue::U64(buf.get_u64_le())
            }
            10 => {
                need(buf, 4)?;
                ArgValue::F32(buf.get_f32_le())
            }
            11 => {
                need(buf, 8)?;
                ArgValue::F64(buf.get_f64_le())
            }
            12 => ArgValue::Str(wire::get_string(buf)?),
            13 => {
                need(buf, 8)?;
                ArgValue::Vec2(buf.get_f32_le(), buf.get_f32_le())
            }
            14 => {
                need(buf, 12)?;
                ArgValue::Vec3(buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le())
            }
            TAG_JSON => {
                let type_name = wire::get_string(buf)?;
                let doc = wire::get_string(buf)?;
                let value =
                    serde_json::from_str(&doc).map_err(|e| DecodeError::InvalidJson {
                        type_name: type_name.clone(),
                        message: e.to_string(),
                    })?;
                ArgValue::Json { type_name, value }
            }
            other => return Err(DecodeError::UnknownTypeTag(other)),
        };
        Ok(value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ArgValue::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ArgValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ArgValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ArgValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<(f32, f32)> {
        match self {
            ArgValue::Vec2(x, y) => Some((*x, *y)),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<(f32, f32, f32)> {
        match self {
            ArgValue::Vec3(x, y, z) => Some((*x, *y, *z)),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ArgValue::Json { value, .. } => Some(value),
            _ => None,
        }
    }
}
