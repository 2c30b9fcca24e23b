//! Streaming write pipeline for YXDB containers.
//!
//! The writer makes a single pass over the record stream and two seeks at
//! the end: a 512-byte zero placeholder goes out first, then the schema,
//! then one block per `RECORDS_PER_BLOCK` buffered records. Finalization
//! rewrites the header at offset 0 and appends the block index. A failure
//! in any state aborts; the partial file is left on disk.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use chrono::Utc;
use log::{debug, info};

use super::error::{Result, YxdbError};
use super::models::{Record, RecordInfo, YxdbHeader, HEADER_SIZE, RECORDS_PER_BLOCK};
use super::{blocks, header, index, records, schema};

/// Statistics the writer accumulates across its single pass.
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    /// Byte length of the serialized schema.
    pub metadata_len: u64,
    /// On-disk length of each written block, in emission order.
    pub block_lengths: Vec<u64>,
    /// Cumulative record count.
    pub num_records: u64,
}

/// Writer producing a complete YXDB container.
pub struct YxdbWriter<W: Write + Seek> {
    out: W,
    schema: RecordInfo,
    stats: WriterStats,
    buffer: Vec<u8>,
    buffered_records: usize,
    description: String,
}

impl YxdbWriter<File> {
    /// Create a YXDB file at `path` for the given schema.
    pub fn create(path: impl AsRef<Path>, schema: RecordInfo) -> Result<Self> {
        let path = path.as_ref();
        info!("creating YXDB file: {}", path.display());
        Self::new(File::create(path)?, schema)
    }
}

impl<W: Write + Seek> YxdbWriter<W> {
    /// Begin writing to any seekable sink.
    ///
    /// Sinks that cannot seek (pipes) cannot host this format: the header
    /// is rewritten in place at finalization.
    pub fn new(mut out: W, schema: RecordInfo) -> Result<Self> {
        out.write_all(&[0u8; HEADER_SIZE])?;

        let metadata = schema::render(&schema)?;
        out.write_all(&metadata)?;
        debug!("schema written: {} bytes, {} fields", metadata.len(), schema.num_fields());

        Ok(Self {
            out,
            schema,
            stats: WriterStats {
                metadata_len: metadata.len() as u64,
                block_lengths: Vec::new(),
                num_records: 0,
            },
            buffer: Vec::new(),
            buffered_records: 0,
            description: String::new(),
        })
    }

    /// Free-form description copied into the header's 64-byte slot.
    pub fn set_description(&mut self, text: &str) {
        self.description = text.to_string();
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Buffer one record, emitting a block when the buffer fills.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let mark = self.buffer.len();
        if let Err(e) = records::encode_record(&self.schema, record, &mut self.buffer) {
            // Drop the partially encoded record so the buffer stays a
            // clean concatenation of whole records.
            self.buffer.truncate(mark);
            return Err(e);
        }
        self.buffered_records += 1;
        self.stats.num_records += 1;
        if self.buffered_records == RECORDS_PER_BLOCK {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Drain a record stream into the writer.
    pub fn write_records<I>(&mut self, iter: I) -> Result<()>
    where
        I: IntoIterator<Item = Record>,
    {
        for record in iter {
            self.write_record(&record)?;
        }
        Ok(())
    }

    fn next_block_offset(&self) -> u64 {
        HEADER_SIZE as u64 + self.stats.metadata_len + self.stats.block_lengths.iter().sum::<u64>()
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.buffered_records == 0 {
            return Ok(());
        }
        let offset = self.next_block_offset();
        let encoded = blocks::encode_block(&self.buffer, offset)?;
        self.out.write_all(&encoded)?;
        debug!(
            "block written at offset {}: {} records, {} -> {} bytes",
            offset,
            self.buffered_records,
            self.buffer.len(),
            encoded.len()
        );
        self.stats.block_lengths.push(encoded.len() as u64);
        self.buffer.clear();
        self.buffered_records = 0;
        Ok(())
    }

    /// Flush the final partial block, then patch the header at offset 0 and
    /// append the block index. Returns the header as written.
    pub fn finish(mut self) -> Result<YxdbHeader> {
        self.flush_block()?;

        // One offset per block, pointing at its length prefix.
        let start_of_blocks = HEADER_SIZE as u64 + self.stats.metadata_len;
        let mut offsets = Vec::with_capacity(self.stats.block_lengths.len());
        let mut position = start_of_blocks;
        for length in &self.stats.block_lengths {
            offsets.push(position);
            position += length;
        }

        let mut file_header = YxdbHeader::new();
        file_header.set_description(&self.description);
        file_header.creation_date = creation_timestamp()?;
        file_header.meta_info_len = (self.stats.metadata_len / 2) as u32;
        file_header.record_block_index_pos = position;
        file_header.num_records = self.stats.num_records;

        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header::render(&file_header))?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.write_all(&index::encode_index(&offsets))?;
        self.out.flush()?;

        info!(
            "YXDB container finished: {} records in {} blocks, index at {}",
            self.stats.num_records,
            offsets.len(),
            position
        );
        Ok(file_header)
    }
}

fn creation_timestamp() -> Result<u32> {
    let now = Utc::now().timestamp();
    u32::try_from(now).map_err(|_| {
        YxdbError::Header(format!("Creation timestamp {} does not fit the 32-bit header field", now))
    })
}
