//! Calgary container reader.
//!
//! Calgary files hold the same schema and records as YXDB but in a
//! different outer layout: a fixed opaque prelude carrying the index
//! position, an uncompressed schema length + schema, raw record-vector
//! blocks, and a table of u32 LE absolute offsets at `indexPosition`
//! running to the end of the file. Block ranges pair consecutive offsets;
//! the last range ends at `indexPosition`. Blocks carry no length prefix
//! and no compression bit: the range delimits the bytes exactly.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, trace};

use super::error::{Result, YxdbError};
use super::models::{Record, RecordInfo};
use super::{records, schema};

/// Size of the opaque Calgary prelude in bytes.
pub const CALGARY_HEADER_SIZE: usize = 512;
/// Byte offset of `indexPosition` within the prelude.
pub const CALGARY_INDEX_POS_OFFSET: usize = 4;

/// Reader for a Calgary container.
///
/// The prelude is preserved verbatim and not interpreted beyond its index
/// position field.
#[derive(Debug)]
pub struct CalgaryReader<R: Read + Seek> {
    source: Mutex<R>,
    prelude: Vec<u8>,
    index_position: u32,
    record_info: RecordInfo,
    block_index: Vec<u32>,
}

impl CalgaryReader<File> {
    /// Open and parse a Calgary file from the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("opening Calgary file: {}", path.display());
        Self::from_source(File::open(path)?)
    }
}

impl<R: Read + Seek> CalgaryReader<R> {
    /// Parse a Calgary container from any seekable byte source.
    pub fn from_source(mut source: R) -> Result<Self> {
        let mut prelude = vec![0u8; CALGARY_HEADER_SIZE];
        source.seek(SeekFrom::Start(0))?;
        source.read_exact(&mut prelude).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                YxdbError::Header(format!(
                    "Truncated Calgary header: file is shorter than {} bytes",
                    CALGARY_HEADER_SIZE
                ))
            } else {
                YxdbError::Io(e)
            }
        })?;
        let index_position =
            LittleEndian::read_u32(&prelude[CALGARY_INDEX_POS_OFFSET..CALGARY_INDEX_POS_OFFSET + 4]);

        // Schema: u32 LE code-unit count, then UTF-16LE bytes.
        let mut count_bytes = [0u8; 4];
        source.read_exact(&mut count_bytes)?;
        let num_characters = LittleEndian::read_u32(&count_bytes);
        let mut schema_bytes = vec![0u8; 2 * num_characters as usize];
        source.read_exact(&mut schema_bytes).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                YxdbError::Schema(format!(
                    "Truncated Calgary schema: expected {} UTF-16 code units",
                    num_characters
                ))
            } else {
                YxdbError::Io(e)
            }
        })?;
        let record_info = schema::parse(&schema_bytes)?;

        let data_start = (CALGARY_HEADER_SIZE + 4 + schema_bytes.len()) as u64;
        if (index_position as u64) < data_start {
            return Err(YxdbError::Index(format!(
                "Calgary index position {} lies inside the schema region ending at {}",
                index_position, data_start
            )));
        }

        // Index: u32 LE absolute offsets from indexPosition to EOF.
        source.seek(SeekFrom::Start(index_position as u64))?;
        let mut trailer = Vec::new();
        source.read_to_end(&mut trailer)?;
        if trailer.len() % 4 != 0 {
            return Err(YxdbError::Index(format!(
                "Calgary index trailer spans {} bytes, not a multiple of 4",
                trailer.len()
            )));
        }
        let block_index: Vec<u32> = trailer.chunks_exact(4).map(LittleEndian::read_u32).collect();
        for pair in block_index.windows(2) {
            if pair[1] <= pair[0] {
                return Err(YxdbError::Index(format!(
                    "Non-monotone Calgary block offsets: {} follows {}",
                    pair[1], pair[0]
                )));
            }
        }
        for &offset in &block_index {
            if (offset as u64) < data_start || offset > index_position {
                return Err(YxdbError::Index(format!(
                    "Calgary block offset {} falls outside the record region [{}, {})",
                    offset, data_start, index_position
                )));
            }
        }

        info!(
            "Calgary container parsed: {} fields, {} blocks",
            record_info.num_fields(),
            block_index.len()
        );

        Ok(Self {
            source: Mutex::new(source),
            prelude,
            index_position,
            record_info,
            block_index,
        })
    }

    pub fn record_info(&self) -> &RecordInfo {
        &self.record_info
    }

    pub fn num_blocks(&self) -> usize {
        self.block_index.len()
    }

    pub fn index_position(&self) -> u32 {
        self.index_position
    }

    /// The raw prelude bytes, preserved verbatim.
    pub fn prelude(&self) -> &[u8] {
        &self.prelude
    }

    /// Decode the block at `block_idx` into its record vector.
    pub fn read_block(&self, block_idx: usize) -> Result<Vec<Record>> {
        let start = *self.block_index.get(block_idx).ok_or_else(|| {
            YxdbError::Index(format!(
                "Calgary block {} out of range: the index holds {} blocks",
                block_idx,
                self.block_index.len()
            ))
        })?;
        let end = self
            .block_index
            .get(block_idx + 1)
            .copied()
            .unwrap_or(self.index_position);
        trace!("reading Calgary block {}: bytes [{}, {})", block_idx, start, end);

        let mut raw = vec![0u8; (end - start) as usize];
        {
            let mut source = self.source.lock().map_err(|_| YxdbError::LockPoisoned)?;
            source.seek(SeekFrom::Start(start as u64))?;
            source.read_exact(&mut raw).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    YxdbError::Block {
                        offset: start as u64,
                        reason: format!(
                            "Calgary block range [{}, {}) extends past the end of the file",
                            start, end
                        ),
                    }
                } else {
                    YxdbError::Io(e)
                }
            })?;
        }

        let mut cursor = raw.as_slice();
        let mut vector = Vec::new();
        while !cursor.is_empty() {
            vector.push(records::decode_record(&self.record_info, &mut cursor)?);
        }
        debug!("Calgary block {} decoded: {} records", block_idx, vector.len());
        Ok(vector)
    }

    /// Iterator over per-block record vectors, in file order.
    pub fn record_vectors(&self) -> CalgaryBlockIterator<'_, R> {
        CalgaryBlockIterator {
            reader: self,
            next_block: 0,
            failed: false,
        }
    }

    /// Iterator over all records, flattening the block vectors.
    pub fn records(&self) -> CalgaryRecordIterator<'_, R> {
        CalgaryRecordIterator {
            blocks: self.record_vectors(),
            current: Vec::new().into_iter(),
        }
    }
}

/// Iterator over Calgary record vectors.
///
/// Created by [`CalgaryReader::record_vectors`].
pub struct CalgaryBlockIterator<'a, R: Read + Seek> {
    reader: &'a CalgaryReader<R>,
    next_block: usize,
    failed: bool,
}

impl<'a, R: Read + Seek> Iterator for CalgaryBlockIterator<'a, R> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_block >= self.reader.num_blocks() {
            return None;
        }
        let result = self.reader.read_block(self.next_block);
        self.next_block += 1;
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Iterator over all Calgary records, in file order.
///
/// Created by [`CalgaryReader::records`].
pub struct CalgaryRecordIterator<'a, R: Read + Seek> {
    blocks: CalgaryBlockIterator<'a, R>,
    current: std::vec::IntoIter<Record>,
}

impl<'a, R: Read + Seek> Iterator for CalgaryRecordIterator<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            match self.blocks.next()? {
                Ok(vector) => self.current = vector.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Owning record iterator over a Calgary file on disk.
///
/// Created by [`crate::yxdb::calgary_file_records`].
pub struct CalgaryFileRecords {
    reader: CalgaryReader<File>,
    next_block: usize,
    current: std::vec::IntoIter<Record>,
    failed: bool,
}

impl CalgaryFileRecords {
    pub(super) fn new(reader: CalgaryReader<File>) -> Self {
        Self {
            reader,
            next_block: 0,
            current: Vec::new().into_iter(),
            failed: false,
        }
    }
}

impl Iterator for CalgaryFileRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            if self.failed || self.next_block >= self.reader.num_blocks() {
                return None;
            }
            match self.reader.read_block(self.next_block) {
                Ok(vector) => {
                    self.next_block += 1;
                    self.current = vector.into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
