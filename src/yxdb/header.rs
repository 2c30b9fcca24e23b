//! Fixed 512-byte file prelude codec.

use byteorder::{ByteOrder, LittleEndian};

use super::error::{Result, YxdbError};
use super::models::{YxdbHeader, FILE_ID_PLAIN, FILE_ID_SPATIAL, HEADER_SIZE};

/// Byte length of the reserved remainder after `compressionVersion`.
pub const RESERVED_SIZE: usize = HEADER_SIZE - 116;

/// Parse the prelude from the first [`HEADER_SIZE`] bytes of a file.
///
/// The magic is checked before any length field is trusted; a file still
/// being written shows a zero header and is rejected here.
pub fn parse(bytes: &[u8]) -> Result<YxdbHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(YxdbError::Header(format!(
            "Truncated header: {} bytes, need {}",
            bytes.len(),
            HEADER_SIZE
        )));
    }

    let file_id = LittleEndian::read_u32(&bytes[64..68]);
    if file_id != FILE_ID_SPATIAL && file_id != FILE_ID_PLAIN {
        return Err(YxdbError::BadMagic { found: file_id });
    }

    let mut description = [0u8; 64];
    description.copy_from_slice(&bytes[..64]);

    Ok(YxdbHeader {
        description,
        file_id,
        creation_date: LittleEndian::read_u32(&bytes[68..72]),
        flags1: LittleEndian::read_u32(&bytes[72..76]),
        flags2: LittleEndian::read_u32(&bytes[76..80]),
        meta_info_len: LittleEndian::read_u32(&bytes[80..84]),
        mystery: LittleEndian::read_u32(&bytes[84..88]),
        spatial_index_pos: LittleEndian::read_u64(&bytes[88..96]),
        record_block_index_pos: LittleEndian::read_u64(&bytes[96..104]),
        num_records: LittleEndian::read_u64(&bytes[104..112]),
        compression_version: LittleEndian::read_u32(&bytes[112..116]),
        reserved: bytes[116..HEADER_SIZE].to_vec(),
    })
}

/// Render the prelude to exactly [`HEADER_SIZE`] bytes.
///
/// Reserved bytes are copied verbatim; a short reserved buffer is
/// zero-filled to the page boundary.
pub fn render(header: &YxdbHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(&header.description);
    out.extend_from_slice(&header.file_id.to_le_bytes());
    out.extend_from_slice(&header.creation_date.to_le_bytes());
    out.extend_from_slice(&header.flags1.to_le_bytes());
    out.extend_from_slice(&header.flags2.to_le_bytes());
    out.extend_from_slice(&header.meta_info_len.to_le_bytes());
    out.extend_from_slice(&header.mystery.to_le_bytes());
    out.extend_from_slice(&header.spatial_index_pos.to_le_bytes());
    out.extend_from_slice(&header.record_block_index_pos.to_le_bytes());
    out.extend_from_slice(&header.num_records.to_le_bytes());
    out.extend_from_slice(&header.compression_version.to_le_bytes());
    let reserved = header.reserved.iter().copied().take(RESERVED_SIZE);
    out.extend(reserved);
    out.resize(HEADER_SIZE, 0);
    out
}
