//! Custom error types for the yxdb-io crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum YxdbError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file prelude is malformed or truncated.
    #[error("Invalid header: {0}")]
    Header(String),

    /// The file identifier does not name a YXDB container.
    #[error("Bad magic number: {found:#010x}")]
    BadMagic { found: u32 },

    /// The XML record schema is malformed or violates a field invariant.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A record block is truncated, oversized, or failed to decompress.
    #[error("Block error at byte offset {offset}: {reason}")]
    Block { offset: u64, reason: String },

    /// A field value could not be encoded or decoded against its schema.
    #[error("Record error: {0}")]
    Record(String),

    /// The trailing block index is inconsistent with the file.
    #[error("Block index error: {0}")]
    Index(String),

    /// A pipe-delimited schema line or row failed to parse or render.
    #[error("Text error: {0}")]
    Text(String),

    /// A lock on the underlying file was poisoned by a panic in another
    /// thread holding it.
    #[error("A lock on the underlying file was poisoned")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's `YxdbError` type.
pub type Result<T> = std::result::Result<T, YxdbError>;
