//! Frame layout and field codec.
//!
//! # Frame Format
//!
//! ```text
//! [kind: u8][tag: u32][sender: u32][count: u32][payload fields...]
//! ```
//!
//! All integers and floats are little-endian. The whole frame is then
//! LZ4-compressed with a size prefix (see [`meso_transport::wire`]).
//!
//! Readers check the remaining length before every fixed-size read so a short
//! frame surfaces as [`CodecError::Truncated`] instead of a panic.

use crate::MessageKind;
use bytes::{Buf, BufMut, BytesMut};
use glam::DVec3;
use meso_transport::WireError;
use meso_types::{Pid, Tag};
use thiserror::Error;

/// Encoded header size in bytes.
pub const FRAME_HEADER_LEN: usize = 1 + 4 + 4 + 4;

/// Errors from encoding or decoding frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("unknown message kind byte {0}")]
    UnknownKind(u8),

    #[error("frame carries a {found} payload, expected {expected}")]
    KindMismatch {
        expected: MessageKind,
        found: MessageKind,
    },

    #[error("frame carries {found}, expected {expected}")]
    TagMismatch { expected: Tag, found: Tag },

    #[error("frame was sent by {found}, expected {expected}")]
    SenderMismatch { expected: Pid, found: Pid },

    #[error("frame declares {count} elements, capacity is {max}")]
    TooManyElements { count: usize, max: usize },

    #[error("truncated frame: {field} needs {needed} bytes, {remaining} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: MessageKind,
    pub tag: Tag,
    pub sender: Pid,
    pub count: usize,
}

impl FrameHeader {
    /// Append the header to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.kind.wire_id());
        buf.put_u32_le(self.tag.0);
        buf.put_u32_le(self.sender.0);
        buf.put_u32_le(self.count as u32);
    }

    /// Read a header from the front of `buf`.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, FRAME_HEADER_LEN, "header")?;
        let kind_byte = buf.get_u8();
        let kind = MessageKind::from_wire_id(kind_byte).ok_or(CodecError::UnknownKind(kind_byte))?;
        Ok(Self {
            kind,
            tag: Tag(buf.get_u32_le()),
            sender: Pid(buf.get_u32_le()),
            count: buf.get_u32_le() as usize,
        })
    }
}

/// Fail with [`CodecError::Truncated`] unless `needed` bytes remain.
pub fn ensure(buf: &[u8], needed: usize, field: &'static str) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            field,
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Append a vector as three little-endian `f64`.
pub fn put_dvec3(buf: &mut BytesMut, value: DVec3) {
    buf.put_f64_le(value.x);
    buf.put_f64_le(value.y);
    buf.put_f64_le(value.z);
}

/// Read a vector. The caller has checked 24 bytes remain.
pub fn get_dvec3(buf: &mut &[u8]) -> DVec3 {
    let x = buf.get_f64_le();
    let y = buf.get_f64_le();
    let z = buf.get_f64_le();
    DVec3::new(x, y, z)
}

/// Read a `u32` length prefix.
pub fn get_len(buf: &mut &[u8], field: &'static str) -> Result<usize, CodecError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32_le() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader {
            kind: MessageKind::Forces,
            tag: Tag(70),
            sender: Pid(3),
            count: 12,
        };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), FRAME_HEADER_LEN);

        let mut slice: &[u8] = &buf;
        assert_eq!(FrameHeader::decode(&mut slice).unwrap(), header);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_short_header_is_truncated() {
        let mut slice: &[u8] = &[2, 0, 0];
        assert!(matches!(
            FrameHeader::decode(&mut slice),
            Err(CodecError::Truncated { field: "header", .. })
        ));
    }

    #[test]
    fn test_unknown_kind_byte() {
        let mut slice: &[u8] = &[99, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            FrameHeader::decode(&mut slice),
            Err(CodecError::UnknownKind(99))
        );
    }
}
