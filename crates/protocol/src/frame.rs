//! Frame discriminators and control/spawn frame codecs
//!
//! Every datagram carries one logical message, discriminated by its
//! leading byte:
//!
//! - `0x00`: connection handshake ping, a single byte, ignored on receipt
//! - `0x01`: client-id assignment, 5 bytes total, payload is a
//!   little-endian u32 client id
//! - `0xFF`: entity spawn
//! - anything else: an RPC frame, where the byte is the first byte of the
//!   method name's length prefix (see [`crate::rpc::RpcFrame`])

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeResult};
use crate::wire::{self, need};

/// Discriminator of the handshake ping frame.
pub const HANDSHAKE_PING: u8 = 0x00;
/// Discriminator of the client-id assignment frame.
pub const CLIENT_ID_ASSIGNMENT: u8 = 0x01;
/// Discriminator of the entity spawn frame.
pub const SPAWN: u8 = 0xFF;

/// Total size of a client-id assignment frame.
pub const CLIENT_ID_FRAME_LEN: usize = 5;

/// The single-byte handshake ping a client sends right after the
/// transport reports a connection.
pub fn handshake_ping() -> Bytes {
    Bytes::from_static(&[HANDSHAKE_PING])
}

pub fn is_handshake_ping(frame: &[u8]) -> bool {
    frame.len() == 1 && frame[0] == HANDSHAKE_PING
}

/// Encodes the `0x01` client-id assignment frame the host sends as the
/// very first reliable frame to a newly connected peer.
pub fn client_id_assignment(client_id: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(CLIENT_ID_FRAME_LEN);
    buf.put_u8(CLIENT_ID_ASSIGNMENT);
    buf.put_u32_le(client_id);
    buf.freeze()
}

/// Parses a client-id assignment frame, if `frame` is one.
pub fn parse_client_id_assignment(frame: &[u8]) -> Option<u32> {
    if frame.len() != CLIENT_ID_FRAME_LEN || frame[0] != CLIENT_ID_ASSIGNMENT {
        return None;
    }
    let mut payload = [0u8; 4];
    payload.copy_from_slice(&frame[1..5]);
    Some(u32::from_le_bytes(payload))
}

pub fn is_spawn(frame: &[u8]) -> bool {
    frame.first() == Some(&SPAWN)
}

/// Entity spawn frame, broadcast by the host when an entity is created
/// and replayed per entity during late-joiner sync.
///
/// Wire format:
/// ```text
/// 0xFF              : u8
/// type_name         : length-prefixed UTF-8 string
/// network object id : u32 LE
/// owner client id   : u32 LE
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnFrame {
    /// Stable fully-qualified entity type name.
    pub type_name: String,

    /// Id the host assigned to the entity.
    pub object_id: u32,

    /// Client that owns the entity (0 = host).
    pub owner: u32,
}

impl SpawnFrame {
    pub fn new(type_name: impl Into<String>, object_id: u32, owner: u32) -> Self {
        Self {
            type_name: type_name.into(),
            object_id,
            owner,
        }
    }

    /// Serializes the spawn frame.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + 5 + self.type_name.len() + 8);
        buf.put_u8(SPAWN);
        wire::put_string(&mut buf, &self.type_name);
        buf.put_u32_le(self.object_id);
        buf.put_u32_le(self.owner);
        buf.freeze()
    }

    /// Deserializes a spawn frame, including the leading discriminator.
    pub fn from_bytes(mut data: Bytes) -> DecodeResult<Self> {
        need(&data, 1)?;
        if data.get_u8() != SPAWN {
            return Err(DecodeError::NotSpawnFrame);
        }
        let type_name = wire::get_string(&mut data)?;
        need(&data, 8)?;
        let object_id = data.get_u32_le();
        let owner = data.get_u32_le();
        Ok(Self {
            type_name,
            object_id,
            owner,
        })
    }
}
