//! Iterators for sequential access to YXDB containers.
//!
//! [`BlockIterator`] yields decompressed block payloads in file order;
//! [`RecordIterator`] layers the record codec on top of it. Both stop after
//! the first error: every error in this format is fatal to the pipeline,
//! so there is nothing meaningful to resume.

use std::io::{Read, Seek};

use super::error::Result;
use super::models::Record;
use super::reader::YxdbReader;
use super::records::BlocksToRecords;

/// Iterator over decompressed block payloads.
///
/// Created by [`YxdbReader::blocks`].
pub struct BlockIterator<'a, R: Read + Seek> {
    reader: &'a YxdbReader<R>,
    next_block: usize,
    failed: bool,
}

impl<'a, R: Read + Seek> BlockIterator<'a, R> {
    pub(super) fn new(reader: &'a YxdbReader<R>) -> Self {
        Self {
            reader,
            next_block: 0,
            failed: false,
        }
    }
}

impl<'a, R: Read + Seek> Iterator for BlockIterator<'a, R> {
    type Item = Result<Vec<u8>>;

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

/// Iterator over all records of a container, in file order.
///
/// Created by [`YxdbReader::records`]; this is the block-to-record stage
/// applied to [`BlockIterator`].
pub struct RecordIterator<'a, R: Read + Seek> {
    inner: BlocksToRecords<BlockIterator<'a, R>>,
}

impl<'a, R: Read + Seek> RecordIterator<'a, R> {
    pub(super) fn new(inner: BlocksToRecords<BlockIterator<'a, R>>) -> Self {
        Self { inner }
    }
}

impl<'a, R: Read + Seek> Iterator for RecordIterator<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Owning record iterator over a YXDB file on disk.
///
/// Created by [`crate::yxdb::file_records`]; decodes one block of records
/// at a time.
pub struct FileRecords {
    reader: YxdbReader<std::fs::File>,
    next_block: usize,
    current: std::vec::IntoIter<Record>,
    failed: bool,
}

impl FileRecords {
    pub(super) fn new(reader: YxdbReader<std::fs::File>) -> Self {
        Self {
            reader,
            next_block: 0,
            current: Vec::new().into_iter(),
            failed: false,
        }
    }
}

impl Iterator for FileRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(Ok(record));
            }
            if self.failed || self.next_block >= self.reader.num_blocks() {
                return None;
            }
            match self.reader.read_block_records(self.next_block) {
                Ok(block_records) => {
                    self.next_block += 1;
                    self.current = block_records.into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
