//! Reader and writer for the YXDB record container format and its
//! Calgary variant, with a pipe-delimited text bridge for interchange.
//!
//! A YXDB file is a 512-byte header, a UTF-16LE XML record schema, a run
//! of length-prefixed LZF-compressed record blocks, and a trailing block
//! index of absolute byte offsets. Records are typed, nullable, and laid
//! out densely by the schema; files of any size stream through fixed
//! memory in both directions.
//!
//! # Example
//! ```no_run
//! use yxdb_io::{Field, FieldType, FieldValue, RecordInfo, YxdbReader, YxdbWriter};
//!
//! # fn main() -> yxdb_io::Result<()> {
//! let schema = RecordInfo::new(vec![
//!     Field::new("id", FieldType::Int32).validate()?,
//!     Field::new("name", FieldType::VString).with_size(255).validate()?,
//! ])?;
//!
//! let mut writer = YxdbWriter::create("people.yxdb", schema)?;
//! writer.write_record(&vec![
//!     Some(FieldValue::Int32(1)),
//!     Some(FieldValue::VString("ada".to_string())),
//! ])?;
//! writer.finish()?;
//!
//! let reader = YxdbReader::open("people.yxdb")?;
//! for record in reader.records() {
//!     println!("{:?}", record?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod yxdb;

pub use yxdb::{
    calgary_file_records, file_records, read_metadata, CalgaryFileRecords, CalgaryReader, Field,
    FieldType, FieldValue, FileRecords, Record, RecordInfo, Result, WriterStats, YxdbError,
    YxdbHeader, YxdbMetadata, YxdbReader, YxdbWriter,
};
