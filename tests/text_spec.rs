use std::io::Cursor;

use chrono::NaiveDate;
use yxdb_io::yxdb::text;
use yxdb_io::{FieldType, FieldValue, Record, YxdbError};

type HeaderFixture = (&'static str, &'static [(FieldType, Option<u32>, Option<u32>)]);

const HEADER_FIXTURES: &[HeaderFixture] = &[
    (
        "month:date|market:int(16)|num_households:int(32)\n",
        &[
            (FieldType::Date, None, None),
            (FieldType::Int16, None, None),
            (FieldType::Int32, None, None),
        ],
    ),
    (
        "flag:bool|tiny:int(8)|big:int(64)",
        &[
            (FieldType::Bool, None, None),
            (FieldType::Byte, None, None),
            (FieldType::Int64, None, None),
        ],
    ),
    (
        "price:decimal(12,2)|code:string(8)|name:wstring(16)",
        &[
            (FieldType::FixedDecimal, Some(12), Some(2)),
            (FieldType::String, Some(8), None),
            (FieldType::WString, Some(16), None),
        ],
    ),
    (
        "note:vstring(100)|wide:vwstring(50)|img:blob(4096)|geom:spatial(4096)",
        &[
            (FieldType::VString, Some(100), None),
            (FieldType::VWString, Some(50), None),
            (FieldType::Blob, Some(4096), None),
            (FieldType::SpatialObject, Some(4096), None),
        ],
    ),
];

#[test]
fn schema_lines_parse_to_declared_types() {
    for (line, expected) in HEADER_FIXTURES {
        let schema = text::parse_header(line)
            .unwrap_or_else(|e| panic!("failed to parse {:?}: {}", line, e));
        assert_eq!(schema.num_fields(), expected.len(), "field count for {:?}", line);
        for (field, (field_type, size, scale)) in schema.fields.iter().zip(expected.iter()) {
            assert_eq!(field.field_type, *field_type, "type of {:?} in {:?}", field.name, line);
            assert_eq!(field.size, *size, "size of {:?} in {:?}", field.name, line);
            assert_eq!(field.scale, *scale, "scale of {:?} in {:?}", field.name, line);
        }
    }
}

#[test]
fn rendered_schema_lines_parse_back() {
    for (line, _) in HEADER_FIXTURES {
        let schema = text::parse_header(line).expect("parse schema line");
        let rendered = text::render_header(&schema).expect("render schema line");
        let reparsed = text::parse_header(&rendered).expect("reparse rendered line");
        for (a, b) in schema.fields.iter().zip(reparsed.fields.iter()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.field_type, b.field_type);
            assert_eq!(a.scale, b.scale);
            // Variable-length strings render unparameterised, so their
            // size resets to the unbounded default on reparse.
            if !a.field_type.is_variable_length() {
                assert_eq!(a.size, b.size, "size of {:?} in {:?}", a.name, line);
            }
        }
    }
}

#[test]
fn variable_strings_render_unparameterised() {
    let schema = text::parse_header("note:vstring(100)|wide:vwstring(50)").unwrap();
    let rendered = text::render_header(&schema).unwrap();
    assert_eq!(rendered, "note:vstring|wide:vwstring");
}

#[test]
fn rows_round_trip_for_non_lossy_types() {
    let schema = text::parse_header("a:int(32)|b:double|c:string(8)|d:int(64)").unwrap();
    let rows: Vec<Record> = vec![
        vec![
            Some(FieldValue::Int32(-17)),
            Some(FieldValue::Double(2.5)),
            Some(FieldValue::String("abc".to_string())),
            Some(FieldValue::Int64(1_000_000_007)),
        ],
        vec![None, Some(FieldValue::Double(0.0)), None, Some(FieldValue::Int64(-1))],
    ];

    for row in &rows {
        let line = text::render_row(&schema, row).expect("render row");
        let reparsed = text::parse_row(&schema, &line).expect("reparse row");
        assert_eq!(&reparsed, row, "row {:?} did not survive the trip", line);
    }
}

#[test]
fn missing_trailing_cells_are_null() {
    let schema = text::parse_header("a:int(32)|b:int(32)|c:int(32)").unwrap();
    let record = text::parse_row(&schema, "5|").expect("parse short row");
    assert_eq!(
        record,
        vec![Some(FieldValue::Int32(5)), None, None],
        "empty and missing cells must both be null"
    );
}

#[test]
fn extra_cells_are_rejected() {
    let schema = text::parse_header("a:int(32)").unwrap();
    let err = text::parse_row(&schema, "1|2").expect_err("extra cell must fail");
    assert!(matches!(err, YxdbError::Text(_)), "unexpected error: {:?}", err);
}

#[test]
fn dates_and_binary_values_round_trip() {
    let schema = text::parse_header("day:date|img:blob(16)").unwrap();
    let row: Record = vec![
        Some(FieldValue::Date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap())),
        Some(FieldValue::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF])),
    ];
    let line = text::render_row(&schema, &row).expect("render row");
    assert_eq!(line, "1999-12-31|deadbeef");
    assert_eq!(text::parse_row(&schema, &line).expect("reparse row"), row);
}

#[test]
fn pipe_in_value_cannot_be_rendered() {
    let schema = text::parse_header("s:string(16)").unwrap();
    let row: Record = vec![Some(FieldValue::String("a|b".to_string()))];
    let err = text::render_row(&schema, &row).expect_err("pipes cannot be quoted");
    assert!(matches!(err, YxdbError::Text(_)), "unexpected error: {:?}", err);
}

#[test]
fn malformed_declarations_are_rejected() {
    for line in [
        "noseparator",
        "a:int(12)",
        "a:decimal(10)",
        "a:string",
        "bad name:int(32)",
        "a:mystery",
        "",
    ] {
        let err = text::parse_header(line)
            .err()
            .unwrap_or_else(|| panic!("expected {:?} to fail", line));
        assert!(matches!(err, YxdbError::Text(_)), "unexpected error for {:?}: {:?}", line, err);
    }
}

#[test]
fn text_records_stage_decodes_line_stream() {
    let schema = text::parse_header("id:int(32)|name:vstring(32)").unwrap();
    let input = Cursor::new("1|ada\n2|grace\n3|\n".as_bytes().to_vec());

    let rows: Vec<Record> = text::TextRecords::new(schema, input)
        .collect::<yxdb_io::Result<_>>()
        .expect("decode row stream");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec![Some(FieldValue::Int32(1)), Some(FieldValue::VString("ada".to_string()))]);
    assert_eq!(rows[2], vec![Some(FieldValue::Int32(3)), None]);
}

#[test]
fn text_records_stage_stops_at_first_bad_row() {
    let schema = text::parse_header("id:int(32)").unwrap();
    let input = Cursor::new("1\nnot-a-number\n3\n".as_bytes().to_vec());

    let results: Vec<yxdb_io::Result<Record>> = text::TextRecords::new(schema, input).collect();
    assert_eq!(results.len(), 2, "iteration must stop after the first error");
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
}
