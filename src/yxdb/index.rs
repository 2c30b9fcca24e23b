//! Trailing block index codec.
//!
//! The index lives at `recordBlockIndexPos` and runs to the end of the
//! file: a u32 LE count followed by `count` u64 LE absolute byte offsets,
//! one per block, each pointing at the block's length prefix.

use byteorder::{ByteOrder, LittleEndian};

use super::error::{Result, YxdbError};

/// Decode the index from the file trailer bytes.
pub fn decode_index(trailer: &[u8]) -> Result<Vec<u64>> {
    if trailer.len() < 4 {
        return Err(YxdbError::Index(format!(
            "Truncated index: {} bytes, need at least 4 for the count",
            trailer.len()
        )));
    }
    let count = LittleEndian::read_u32(&trailer[..4]) as usize;
    let body = &trailer[4..];
    if body.len() != count * 8 {
        return Err(YxdbError::Index(format!(
            "Index declares {} blocks ({} bytes) but the trailer holds {} bytes",
            count,
            count * 8,
            body.len()
        )));
    }

    let mut offsets = Vec::with_capacity(count);
    for chunk in body.chunks_exact(8) {
        offsets.push(LittleEndian::read_u64(chunk));
    }
    for pair in offsets.windows(2) {
        if pair[1] <= pair[0] {
            return Err(YxdbError::Index(format!(
                "Non-monotone block offsets: {} follows {}",
                pair[1], pair[0]
            )));
        }
    }
    Ok(offsets)
}

/// Encode the index trailer.
pub fn encode_index(offsets: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 8 * offsets.len());
    out.extend_from_slice(&(offsets.len() as u32).to_le_bytes());
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out
}
