//! Low-level wire primitives shared by every frame codec
//!
//! All multi-byte integers on the wire are little-endian. Length prefixes
//! use a 7-bit variable-length encoding: seven bits of length per byte,
//! with the top bit of each byte set iff more bytes follow. This matches
//! the binary-writer format the wire protocol was specified against.

use bytes::{Buf, BufMut};

use crate::error::{DecodeError, DecodeResult};

/// Writes a length as a 7-bit variable-length prefix.
pub fn put_var_len(buf: &mut impl BufMut, mut len: usize) {
    loop {
        let byte = (len & 0x7F) as u8;
        len >>= 7;
        if len == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Reads a 7-bit variable-length prefix.
///
/// Lengths are capped at five bytes (35 bits), enough for any u32 length;
/// a longer prefix is a malformed frame.
pub fn get_var_len(buf: &mut impl Buf) -> DecodeResult<usize> {
    let mut value: usize = 0;
    for septet in 0..5 {
        if !buf.has_remaining() {
            return Err(DecodeError::BufferTooShort { need: 1, have: 0 });
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as usize) << (7 * septet);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::LengthPrefixTooLong)
}

/// Writes a length-prefixed UTF-8 string.
pub fn put_string(buf: &mut impl BufMut, value: &str) {
    put_var_len(buf, value.len());
    buf.put_slice(value.as_bytes());
}

/// Reads a length-prefixed UTF-8 string.
pub fn get_string(buf: &mut impl Buf) -> DecodeResult<String> {
    let len = get_var_len(buf)?;
    if buf.remaining() < len {
        return Err(DecodeError::BufferTooShort {
            need: len,
            have: buf.remaining(),
        });
    }
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)
}

/// Checks that at least `need` bytes remain before a fixed-width read.
#[inline]
pub(crate) fn need(buf: &impl Buf, need: usize) -> DecodeResult<()> {
    if buf.remaining() < need {
        Err(DecodeError::BufferTooShort {
            need,
            have: buf.remaining(),
        })
    } else {
        Ok(())
    }
}
