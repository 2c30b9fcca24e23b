//! Record codec and record/block stage adapters.
//!
//! A record carries no internal length marker: it is delimited by the
//! schema's cumulative field widths plus the length prefixes of its
//! variable-width fields.

use super::error::{Result, YxdbError};
use super::fields;
use super::models::{Record, RecordInfo, RECORDS_PER_BLOCK};

/// Encode a record, appending the field values in schema order to `out`.
pub fn encode_record(schema: &RecordInfo, record: &Record, out: &mut Vec<u8>) -> Result<()> {
    if record.len() != schema.num_fields() {
        return Err(YxdbError::Record(format!(
            "Record has {} values but the schema declares {} fields",
            record.len(),
            schema.num_fields()
        )));
    }
    for (field, value) in schema.fields.iter().zip(record.iter()) {
        fields::encode(field, value.as_ref(), out)?;
    }
    Ok(())
}

/// Decode one record, advancing `cursor` past its wire form.
pub fn decode_record(schema: &RecordInfo, cursor: &mut &[u8]) -> Result<Record> {
    let mut record = Vec::with_capacity(schema.num_fields());
    for field in &schema.fields {
        record.push(fields::decode(field, cursor)?);
    }
    Ok(record)
}

/// Aggregate a record stream into uncompressed block payloads.
///
/// Each yielded payload concatenates up to [`RECORDS_PER_BLOCK`] encoded
/// records; input end flushes the final partial payload. An empty input
/// yields no payloads at all.
pub fn records_to_blocks<I>(schema: RecordInfo, records: I) -> RecordsToBlocks<I::IntoIter>
where
    I: IntoIterator<Item = Record>,
{
    RecordsToBlocks {
        schema,
        records: records.into_iter(),
        failed: false,
    }
}

pub struct RecordsToBlocks<I> {
    schema: RecordInfo,
    records: I,
    failed: bool,
}

impl<I> Iterator for RecordsToBlocks<I>
where
    I: Iterator<Item = Record>,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut payload = Vec::new();
        let mut count = 0usize;
        while count < RECORDS_PER_BLOCK {
            let Some(record) = self.records.next() else { break };
            if let Err(e) = encode_record(&self.schema, &record, &mut payload) {
                self.failed = true;
                return Some(Err(e));
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Ok(payload))
    }
}

/// Flatten decoded block payloads back into a record stream.
///
/// Records never straddle payload boundaries; a payload with trailing bytes
/// that do not decode as a record is a [`YxdbError::Record`].
pub fn blocks_to_records<I>(schema: RecordInfo, blocks: I) -> BlocksToRecords<I::IntoIter>
where
    I: IntoIterator<Item = Result<Vec<u8>>>,
{
    BlocksToRecords {
        schema,
        blocks: blocks.into_iter(),
        current: Vec::new(),
        pos: 0,
        failed: false,
    }
}

pub struct BlocksToRecords<I> {
    schema: RecordInfo,
    blocks: I,
    current: Vec<u8>,
    pos: usize,
    failed: bool,
}

impl<I> Iterator for BlocksToRecords<I>
where
    I: Iterator<Item = Result<Vec<u8>>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.pos >= self.current.len() {
            match self.blocks.next() {
                Some(Ok(payload)) => {
                    self.current = payload;
                    self.pos = 0;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => return None,
            }
        }
        let mut cursor = &self.current[self.pos..];
        let before = cursor.len();
        match decode_record(&self.schema, &mut cursor) {
            Ok(record) => {
                self.pos += before - cursor.len();
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
