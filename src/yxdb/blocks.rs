//! Length-prefixed LZF block codec.
//!
//! On disk a block is a u32 LE `writtenSize` followed by
//! `writtenSize & 0x7FFFFFFF` payload bytes. Bit 31 clear means the payload
//! is LZF-compressed; set means it is stored literally.

use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use super::error::{Result, YxdbError};
use super::models::DECOMPRESSED_BLOCK_LIMIT;

/// High bit of the length prefix: payload stored without compression.
const UNCOMPRESSED_BIT: u32 = 0x8000_0000;
const LENGTH_MASK: u32 = 0x7FFF_FFFF;

/// Decode the block occupying exactly `raw`, whose length prefix sits at
/// absolute byte `offset` in the file. Returns the decompressed payload.
pub fn decode_block(raw: &[u8], offset: u64) -> Result<Vec<u8>> {
    if raw.len() < 4 {
        return Err(YxdbError::Block {
            offset,
            reason: format!("truncated block: {} bytes, need at least 4", raw.len()),
        });
    }
    let written = LittleEndian::read_u32(&raw[..4]);
    let stored_len = (written & LENGTH_MASK) as usize;
    let payload = &raw[4..];
    if stored_len > payload.len() {
        return Err(YxdbError::Block {
            offset,
            reason: format!(
                "length prefix {} exceeds the {} bytes remaining in the block range",
                stored_len,
                payload.len()
            ),
        });
    }
    if stored_len < payload.len() {
        return Err(YxdbError::Block {
            offset,
            reason: format!(
                "length prefix {} does not cover the {}-byte block range",
                stored_len,
                payload.len()
            ),
        });
    }

    if written & UNCOMPRESSED_BIT != 0 {
        trace!("block at offset {}: literal payload, {} bytes", offset, stored_len);
        return Ok(payload.to_vec());
    }

    trace!("block at offset {}: LZF payload, {} bytes compressed", offset, stored_len);
    lzf::decompress(payload, DECOMPRESSED_BLOCK_LIMIT).map_err(|e| YxdbError::Block {
        offset,
        reason: format!("LZF decompression failed: {:?}", e),
    })
}

/// Encode one block for writing at absolute byte `offset`.
///
/// The payload is LZF-compressed when that makes it strictly smaller;
/// otherwise it is stored literally with bit 31 set. Either way the stored
/// size never exceeds the uncompressed size.
pub fn encode_block(payload: &[u8], offset: u64) -> Result<Vec<u8>> {
    if payload.len() as u64 > LENGTH_MASK as u64 {
        return Err(YxdbError::Block {
            offset,
            reason: format!("payload of {} bytes exceeds the 31-bit length prefix", payload.len()),
        });
    }

    if let Ok(compressed) = lzf::compress(payload) {
        if compressed.len() < payload.len() {
            trace!(
                "block at offset {}: compressed {} -> {} bytes",
                offset,
                payload.len(),
                compressed.len()
            );
            let mut out = Vec::with_capacity(4 + compressed.len());
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&compressed);
            return Ok(out);
        }
    }

    trace!("block at offset {}: incompressible, {} bytes literal", offset, payload.len());
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32 | UNCOMPRESSED_BIT).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}
