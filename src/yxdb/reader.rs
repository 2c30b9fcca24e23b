//! Lazy read pipeline for YXDB containers.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use log::{debug, info, trace};

use super::error::{Result, YxdbError};
use super::iter::{BlockIterator, RecordIterator};
use super::models::{Record, RecordInfo, YxdbMetadata, HEADER_SIZE};
use super::records::blocks_to_records;
use super::{blocks, header, index, records, schema};

/// Reader for a YXDB container.
///
/// Opening a file parses the header, the schema, and the trailing block
/// index; record blocks are only read and decompressed on demand, by byte
/// range, so files of any size can be consumed without loading them.
///
/// The underlying source is wrapped in a `Mutex` so the borrowing
/// iterators and random-access block reads can share `&self`.
#[derive(Debug)]
pub struct YxdbReader<R: Read + Seek> {
    source: Mutex<R>,
    metadata: YxdbMetadata,
}

impl YxdbReader<File> {
    /// Open and parse a YXDB file from the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening YXDB file: {}", path.display());
        Self::from_source(File::open(path)?)
    }
}

impl<R: Read + Seek> YxdbReader<R> {
    /// Parse a YXDB container from any seekable byte source.
    pub fn from_source(mut source: R) -> Result<Self> {
        // Header: bytes [0, 512).
        let mut header_bytes = vec![0u8; HEADER_SIZE];
        source.seek(SeekFrom::Start(0))?;
        read_exact_or(&mut source, &mut header_bytes, || {
            YxdbError::Header(format!("Truncated header: file is shorter than {} bytes", HEADER_SIZE))
        })?;
        let file_header = header::parse(&header_bytes)?;
        debug!(
            "header: {} records, block index at {}, schema {} code units",
            file_header.num_records, file_header.record_block_index_pos, file_header.meta_info_len
        );

        // Schema: bytes [512, 512 + 2 * metaInfoLength).
        let schema_len = 2 * file_header.meta_info_len as usize;
        let mut schema_bytes = vec![0u8; schema_len];
        read_exact_or(&mut source, &mut schema_bytes, || {
            YxdbError::Schema(format!("Truncated schema: expected {} bytes after the header", schema_len))
        })?;
        let record_info = schema::parse(&schema_bytes)?;

        // Block index: bytes [recordBlockIndexPos, EOF).
        let start_of_blocks = (HEADER_SIZE + schema_len) as u64;
        if file_header.record_block_index_pos < start_of_blocks {
            return Err(YxdbError::Index(format!(
                "Block index position {} lies inside the schema region ending at {}",
                file_header.record_block_index_pos, start_of_blocks
            )));
        }
        source.seek(SeekFrom::Start(file_header.record_block_index_pos))?;
        let mut trailer = Vec::new();
        source.read_to_end(&mut trailer)?;
        let block_index = index::decode_index(&trailer)?;

        for &offset in &block_index {
            if offset < start_of_blocks || offset >= file_header.record_block_index_pos {
                return Err(YxdbError::Index(format!(
                    "Block offset {} falls outside the record block region [{}, {})",
                    offset, start_of_blocks, file_header.record_block_index_pos
                )));
            }
        }

        info!(
            "YXDB container parsed: {} fields, {} blocks, {} records",
            record_info.num_fields(),
            block_index.len(),
            file_header.num_records
        );

        Ok(Self {
            source: Mutex::new(source),
            metadata: YxdbMetadata {
                header: file_header,
                record_info,
                block_index,
            },
        })
    }

    /// Header, schema, and block index, without any record data.
    pub fn metadata(&self) -> &YxdbMetadata {
        &self.metadata
    }

    /// Consume the reader, keeping only the parsed metadata.
    pub fn into_metadata(self) -> YxdbMetadata {
        self.metadata
    }

    pub fn record_info(&self) -> &RecordInfo {
        &self.metadata.record_info
    }

    pub fn num_blocks(&self) -> usize {
        self.metadata.num_blocks()
    }

    pub fn num_records(&self) -> u64 {
        self.metadata.header.num_records
    }

    /// Read and decode the block at `block_idx`, returning its decompressed
    /// payload. Blocks may be read independently and in any order.
    pub fn read_block(&self, block_idx: usize) -> Result<Vec<u8>> {
        let (start, end) = self.metadata.block_range(block_idx).ok_or_else(|| {
            YxdbError::Index(format!(
                "Block {} out of range: the index holds {} blocks",
                block_idx,
                self.metadata.num_blocks()
            ))
        })?;
        trace!("reading block {}: bytes [{}, {})", block_idx, start, end);

        let mut raw = vec![0u8; (end - start) as usize];
        {
            let mut source = self.source.lock().map_err(|_| YxdbError::LockPoisoned)?;
            source.seek(SeekFrom::Start(start))?;
            read_exact_or(&mut *source, &mut raw, || YxdbError::Block {
                offset: start,
                reason: format!("block range [{}, {}) extends past the end of the file", start, end),
            })?;
        }
        blocks::decode_block(&raw, start)
    }

    /// Decode the block at `block_idx` into its records.
    pub fn read_block_records(&self, block_idx: usize) -> Result<Vec<Record>> {
        let payload = self.read_block(block_idx)?;
        let mut cursor = payload.as_slice();
        let mut out = Vec::new();
        while !cursor.is_empty() {
            out.push(records::decode_record(&self.metadata.record_info, &mut cursor)?);
        }
        Ok(out)
    }

    /// Iterator over decompressed block payloads, in file order.
    pub fn blocks(&self) -> BlockIterator<'_, R> {
        BlockIterator::new(self)
    }

    /// Iterator over all records, in file order.
    pub fn records(&self) -> RecordIterator<'_, R> {
        RecordIterator::new(blocks_to_records(self.metadata.record_info.clone(), self.blocks()))
    }
}

// read_exact with a format-aware error for short reads.
fn read_exact_or<R: Read>(
    source: &mut R,
    buf: &mut [u8],
    truncated: impl FnOnce() -> YxdbError,
) -> Result<()> {
    source.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            truncated()
        } else {
            YxdbError::Io(e)
        }
    })
}
