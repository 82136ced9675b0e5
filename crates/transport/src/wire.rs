//! Frame compression for inter-process messages.
//!
//! Every message frame is LZ4-compressed before it reaches the transport.
//!
//! # Wire Format
//!
//! ```text
//! [u32 LE uncompressed size][LZ4 block]
//! ```
//!
//! The size prefix is LZ4's own framing. [`decompress_bounded`] reads it
//! first so a corrupt or hostile prefix cannot force a huge allocation.

use thiserror::Error;

/// Errors from wire encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("frame of {len} bytes is shorter than the size prefix")]
    MissingPrefix { len: usize },

    #[error("frame declares {declared} bytes, limit is {limit}")]
    TooLarge { declared: usize, limit: usize },
}

/// Compress a frame for transmission.
#[inline]
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress a received frame.
#[inline]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, WireError> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| WireError::DecompressionFailed(e.to_string()))
}

/// Decompress a received frame whose uncompressed size must not exceed `limit`.
pub fn decompress_bounded(data: &[u8], limit: usize) -> Result<Vec<u8>, WireError> {
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|p| p.try_into().ok())
        .ok_or(WireError::MissingPrefix { len: data.len() })?;
    let declared = u32::from_le_bytes(prefix) as usize;
    if declared > limit {
        return Err(WireError::TooLarge { declared, limit });
    }
    decompress(data)
}
