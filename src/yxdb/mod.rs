//! Core YXDB codec module.
//!
//! The container layout is a fixed 512-byte header, a UTF-16LE XML record
//! schema, a run of length-prefixed (optionally LZF-compressed) record
//! blocks, and a trailing table of absolute block offsets. The Calgary
//! variant shares the schema and record codecs inside a different outer
//! layout. Everything streams: readers fetch blocks by byte range on
//! demand, and the writer makes one pass over its record stream with a
//! final seek to patch the header.

pub mod blocks;
pub mod calgary;
pub mod error;
pub mod fields;
pub mod header;
pub mod index;
pub mod iter;
pub mod models;
pub mod reader;
pub mod records;
pub mod schema;
pub mod text;
pub mod writer;

use std::path::Path;

pub use calgary::{CalgaryFileRecords, CalgaryReader};
pub use error::{Result, YxdbError};
pub use iter::FileRecords;
pub use models::{
    Field, FieldType, FieldValue, Record, RecordInfo, YxdbHeader, YxdbMetadata,
};
pub use reader::YxdbReader;
pub use writer::{WriterStats, YxdbWriter};

/// Read a file's header, schema, and block index without touching records.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<YxdbMetadata> {
    Ok(YxdbReader::open(path)?.into_metadata())
}

/// Stream every record of a YXDB file, in file order.
pub fn file_records(path: impl AsRef<Path>) -> Result<FileRecords> {
    Ok(FileRecords::new(YxdbReader::open(path)?))
}

/// Stream every record of a Calgary file, in file order.
pub fn calgary_file_records(path: impl AsRef<Path>) -> Result<CalgaryFileRecords> {
    Ok(CalgaryFileRecords::new(CalgaryReader::open(path)?))
}
