use std::io::Cursor;

use yxdb_io::yxdb::calgary::{CALGARY_HEADER_SIZE, CALGARY_INDEX_POS_OFFSET};
use yxdb_io::yxdb::{records, schema, text};
use yxdb_io::{CalgaryReader, FieldValue, Record, RecordInfo, YxdbError};

// Assemble a Calgary image: 512-byte prelude with the index position at
// offset 4, schema code-unit count + schema, raw record-vector blocks,
// then the u32 offset table running to EOF.
fn build_calgary(schema: &RecordInfo, vectors: &[Vec<Record>]) -> Vec<u8> {
    let schema_bytes = schema::render(schema).expect("render schema");

    let mut out = vec![0u8; CALGARY_HEADER_SIZE];
    out[..4].copy_from_slice(b"CGRY");
    out.extend_from_slice(&((schema_bytes.len() / 2) as u32).to_le_bytes());
    out.extend_from_slice(&schema_bytes);

    let mut offsets: Vec<u32> = Vec::new();
    for vector in vectors {
        offsets.push(out.len() as u32);
        for record in vector {
            records::encode_record(schema, record, &mut out).expect("encode record");
        }
    }

    let index_position = out.len() as u32;
    out[CALGARY_INDEX_POS_OFFSET..CALGARY_INDEX_POS_OFFSET + 4]
        .copy_from_slice(&index_position.to_le_bytes());
    for offset in &offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out
}

fn sample_schema() -> RecordInfo {
    text::parse_header("id:int(32)|tag:vstring(32)").expect("schema line")
}

fn row(id: i32, tag: &str) -> Record {
    vec![Some(FieldValue::Int32(id)), Some(FieldValue::VString(tag.to_string()))]
}

#[test]
fn three_entry_index_yields_three_record_vectors() {
    let schema = sample_schema();
    let vectors = vec![
        vec![row(1, "a"), row(2, "b")],
        vec![row(3, "c")],
        vec![row(4, "d"), row(5, "e"), row(6, "f")],
    ];
    let bytes = build_calgary(&schema, &vectors);

    let reader = CalgaryReader::from_source(Cursor::new(bytes)).expect("open calgary");
    assert_eq!(reader.num_blocks(), 3);
    assert_eq!(reader.record_info(), &schema);

    let decoded: Vec<Vec<Record>> = reader
        .record_vectors()
        .collect::<yxdb_io::Result<_>>()
        .expect("decode record vectors");
    assert_eq!(decoded, vectors);

    let flattened: Vec<Record> = reader
        .records()
        .collect::<yxdb_io::Result<_>>()
        .expect("decode flattened records");
    let expected: Vec<Record> = vectors.into_iter().flatten().collect();
    assert_eq!(flattened, expected, "flattened stream must equal the concatenated vectors");
}

#[test]
fn blocks_are_randomly_accessible() {
    let schema = sample_schema();
    let vectors = vec![vec![row(1, "a")], vec![row(2, "b")], vec![row(3, "c")]];
    let bytes = build_calgary(&schema, &vectors);

    let reader = CalgaryReader::from_source(Cursor::new(bytes)).expect("open calgary");
    // Out of order on purpose.
    assert_eq!(reader.read_block(2).expect("block 2"), vectors[2]);
    assert_eq!(reader.read_block(0).expect("block 0"), vectors[0]);
    assert_eq!(reader.read_block(1).expect("block 1"), vectors[1]);

    let err = reader.read_block(3).expect_err("out-of-range block");
    assert!(matches!(err, YxdbError::Index(_)), "unexpected error: {:?}", err);
}

#[test]
fn prelude_is_preserved_verbatim() {
    let schema = sample_schema();
    let bytes = build_calgary(&schema, &[vec![row(1, "a")]]);

    let reader = CalgaryReader::from_source(Cursor::new(bytes.clone())).expect("open calgary");
    assert_eq!(reader.prelude(), &bytes[..CALGARY_HEADER_SIZE]);
    assert_eq!(reader.index_position() as usize, bytes.len() - 4);
}

#[test]
fn non_monotone_index_is_rejected() {
    let schema = sample_schema();
    let vectors = vec![vec![row(1, "a")], vec![row(2, "b")]];
    let mut bytes = build_calgary(&schema, &vectors);

    // Swap the two index entries in the trailer.
    let trailer_start = bytes.len() - 8;
    let (first, second) = {
        let trailer = &bytes[trailer_start..];
        (trailer[..4].to_vec(), trailer[4..].to_vec())
    };
    bytes[trailer_start..trailer_start + 4].copy_from_slice(&second);
    bytes[trailer_start + 4..].copy_from_slice(&first);

    let err = CalgaryReader::from_source(Cursor::new(bytes)).expect_err("swapped offsets");
    assert!(matches!(err, YxdbError::Index(_)), "unexpected error: {:?}", err);
}

#[test]
fn ragged_index_trailer_is_rejected() {
    let schema = sample_schema();
    let mut bytes = build_calgary(&schema, &[vec![row(1, "a")]]);
    bytes.push(0xFF);

    let err = CalgaryReader::from_source(Cursor::new(bytes)).expect_err("ragged trailer");
    assert!(matches!(err, YxdbError::Index(_)), "unexpected error: {:?}", err);
}

#[test]
fn truncated_calgary_header_is_rejected() {
    let err = CalgaryReader::from_source(Cursor::new(vec![0u8; 64]))
        .expect_err("short prelude must fail");
    assert!(matches!(err, YxdbError::Header(_)), "unexpected error: {:?}", err);
}
