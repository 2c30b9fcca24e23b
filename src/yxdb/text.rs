//! Pipe-delimited text bridge.
//!
//! A schema line declares the fields (`name:type|name:type|…`); each
//! following line is one record, pipe-separated, UTF-8, with no quoting.
//! An empty cell is null and missing trailing cells are null. Binary
//! values (blob, spatial) travel as lowercase hex.

use std::io::BufRead;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::{Result, YxdbError};
use super::models::{Field, FieldType, FieldValue, Record, RecordInfo};

/// Default size for `vstring`/`vwstring` declared without a parameter:
/// the format's unbounded variable-length limit.
const UNBOUNDED_VAR_SIZE: u32 = 0x7FFF_FFFF;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a pipe-delimited schema line into a record schema.
pub fn parse_header(line: &str) -> Result<RecordInfo> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(YxdbError::Text("Empty schema line".to_string()));
    }
    let fields = line
        .split('|')
        .map(parse_field_decl)
        .collect::<Result<Vec<Field>>>()?;
    RecordInfo::new(fields)
}

// One `name:type` declaration.
fn parse_field_decl(decl: &str) -> Result<Field> {
    let (name, type_decl) = decl.split_once(':').ok_or_else(|| {
        YxdbError::Text(format!("Field declaration {:?} is missing the ':' separator", decl))
    })?;
    let (field_type, size, scale) = parse_type(type_decl)?;

    let mut field = Field::new(name, field_type);
    if let Some(size) = size {
        field = field.with_size(size);
    }
    if let Some(scale) = scale {
        field = field.with_scale(scale);
    }
    field.validate().map_err(|e| YxdbError::Text(format!("In declaration {:?}: {}", decl, e)))
}

fn parse_type(decl: &str) -> Result<(FieldType, Option<u32>, Option<u32>)> {
    // Unparameterised spellings first.
    match decl {
        "bool" => return Ok((FieldType::Bool, None, None)),
        "float" => return Ok((FieldType::Float, None, None)),
        "double" => return Ok((FieldType::Double, None, None)),
        "date" => return Ok((FieldType::Date, None, None)),
        "time" => return Ok((FieldType::Time, None, None)),
        "datetime" => return Ok((FieldType::DateTime, None, None)),
        "unknown" => return Ok((FieldType::Unknown, None, None)),
        // Rendered schemas print variable-length strings without a size.
        "vstring" => return Ok((FieldType::VString, Some(UNBOUNDED_VAR_SIZE), None)),
        "vwstring" => return Ok((FieldType::VWString, Some(UNBOUNDED_VAR_SIZE), None)),
        _ => {}
    }

    let (base, args) = split_parameterised(decl)?;
    match base {
        "int" => {
            let width = parse_args(decl, &args, 1)?[0];
            let field_type = match width {
                8 => FieldType::Byte,
                16 => FieldType::Int16,
                32 => FieldType::Int32,
                64 => FieldType::Int64,
                other => {
                    return Err(YxdbError::Text(format!("Unsupported integer width {}", other)));
                }
            };
            Ok((field_type, None, None))
        }
        "decimal" => {
            let args = parse_args(decl, &args, 2)?;
            Ok((FieldType::FixedDecimal, Some(args[0]), Some(args[1])))
        }
        "string" => Ok((FieldType::String, Some(parse_args(decl, &args, 1)?[0]), None)),
        "wstring" => Ok((FieldType::WString, Some(parse_args(decl, &args, 1)?[0]), None)),
        "vstring" => Ok((FieldType::VString, Some(parse_args(decl, &args, 1)?[0]), None)),
        "vwstring" => Ok((FieldType::VWString, Some(parse_args(decl, &args, 1)?[0]), None)),
        "blob" => Ok((FieldType::Blob, Some(parse_args(decl, &args, 1)?[0]), None)),
        "spatial" => Ok((FieldType::SpatialObject, Some(parse_args(decl, &args, 1)?[0]), None)),
        other => Err(YxdbError::Text(format!("Unknown field type {:?}", other))),
    }
}

fn split_parameterised(decl: &str) -> Result<(&str, Vec<&str>)> {
    let open = decl
        .find('(')
        .ok_or_else(|| YxdbError::Text(format!("Unknown field type {:?}", decl)))?;
    let inner = decl[open..]
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| YxdbError::Text(format!("Malformed type parameters in {:?}", decl)))?;
    Ok((&decl[..open], inner.split(',').collect()))
}

fn parse_args(decl: &str, args: &[&str], expected: usize) -> Result<Vec<u32>> {
    if args.len() != expected {
        return Err(YxdbError::Text(format!(
            "Type {:?} takes {} parameter(s), found {}",
            decl,
            expected,
            args.len()
        )));
    }
    args.iter()
        .map(|arg| {
            arg.trim().parse::<u32>().map_err(|_| {
                YxdbError::Text(format!("Invalid type parameter {:?} in {:?}", arg, decl))
            })
        })
        .collect()
}

/// Render a schema back to its pipe-delimited declaration line.
pub fn render_header(schema: &RecordInfo) -> Result<String> {
    let decls = schema
        .fields
        .iter()
        .map(render_field_decl)
        .collect::<Result<Vec<String>>>()?;
    Ok(decls.join("|"))
}

fn render_field_decl(field: &Field) -> Result<String> {
    let sized = |name: &str| -> Result<String> {
        let size = field.size.ok_or_else(|| {
            YxdbError::Text(format!("Field {:?} of type {} has no size", field.name, name))
        })?;
        Ok(format!("{}({})", name, size))
    };
    let type_decl = match field.field_type {
        FieldType::Bool => "bool".to_string(),
        FieldType::Byte => "int(8)".to_string(),
        FieldType::Int16 => "int(16)".to_string(),
        FieldType::Int32 => "int(32)".to_string(),
        FieldType::Int64 => "int(64)".to_string(),
        FieldType::FixedDecimal => {
            let size = field.size.unwrap_or(0);
            let scale = field.scale.unwrap_or(0);
            format!("decimal({},{})", size, scale)
        }
        FieldType::Float => "float".to_string(),
        FieldType::Double => "double".to_string(),
        FieldType::String => sized("string")?,
        FieldType::WString => sized("wstring")?,
        FieldType::VString => "vstring".to_string(),
        FieldType::VWString => "vwstring".to_string(),
        FieldType::Date => "date".to_string(),
        FieldType::Time => "time".to_string(),
        FieldType::DateTime => "datetime".to_string(),
        FieldType::Blob => sized("blob")?,
        FieldType::SpatialObject => sized("spatial")?,
        FieldType::Unknown => "unknown".to_string(),
    };
    Ok(format!("{}:{}", field.name, type_decl))
}

/// Parse one pipe-delimited row against the schema.
pub fn parse_row(schema: &RecordInfo, line: &str) -> Result<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    let cells: Vec<&str> = if line.is_empty() { Vec::new() } else { line.split('|').collect() };
    if cells.len() > schema.num_fields() {
        return Err(YxdbError::Text(format!(
            "Row has {} cells but the schema declares {} fields",
            cells.len(),
            schema.num_fields()
        )));
    }

    let mut record = Vec::with_capacity(schema.num_fields());
    for (i, field) in schema.fields.iter().enumerate() {
        // Missing trailing cells and empty cells are both null.
        let value = match cells.get(i) {
            None | Some(&"") => None,
            Some(text) => Some(parse_value(field, text)?),
        };
        record.push(value);
    }
    Ok(record)
}

fn parse_value(field: &Field, text: &str) -> Result<FieldValue> {
    let invalid = |reason: String| {
        YxdbError::Text(format!("Field {:?}: {}", field.name, reason))
    };
    Ok(match field.field_type {
        FieldType::Bool => match text {
            "true" | "1" => FieldValue::Bool(true),
            "false" | "0" => FieldValue::Bool(false),
            other => return Err(invalid(format!("invalid bool {:?}", other))),
        },
        FieldType::Byte => FieldValue::Byte(
            text.parse().map_err(|_| invalid(format!("invalid int(8) {:?}", text)))?,
        ),
        FieldType::Int16 => FieldValue::Int16(
            text.parse().map_err(|_| invalid(format!("invalid int(16) {:?}", text)))?,
        ),
        FieldType::Int32 => FieldValue::Int32(
            text.parse().map_err(|_| invalid(format!("invalid int(32) {:?}", text)))?,
        ),
        FieldType::Int64 => FieldValue::Int64(
            text.parse().map_err(|_| invalid(format!("invalid int(64) {:?}", text)))?,
        ),
        FieldType::FixedDecimal => {
            let digits = text.strip_prefix('-').unwrap_or(text);
            let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            let valid = match digits.split_once('.') {
                Some((int_part, frac_part)) => numeric(int_part) && numeric(frac_part),
                None => numeric(digits),
            };
            if !valid {
                return Err(invalid(format!("invalid decimal {:?}", text)));
            }
            FieldValue::FixedDecimal(text.to_string())
        }
        FieldType::Float => FieldValue::Float(
            text.parse().map_err(|_| invalid(format!("invalid float {:?}", text)))?,
        ),
        FieldType::Double => FieldValue::Double(
            text.parse().map_err(|_| invalid(format!("invalid double {:?}", text)))?,
        ),
        FieldType::String => FieldValue::String(text.to_string()),
        FieldType::WString => FieldValue::WString(text.to_string()),
        FieldType::VString => FieldValue::VString(text.to_string()),
        FieldType::VWString => FieldValue::VWString(text.to_string()),
        FieldType::Date => FieldValue::Date(
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|e| invalid(format!("invalid date {:?}: {}", text, e)))?,
        ),
        FieldType::Time => FieldValue::Time(
            NaiveTime::parse_from_str(text, TIME_FORMAT)
                .map_err(|e| invalid(format!("invalid time {:?}: {}", text, e)))?,
        ),
        FieldType::DateTime => FieldValue::DateTime(
            NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                .map_err(|e| invalid(format!("invalid datetime {:?}: {}", text, e)))?,
        ),
        FieldType::Blob => FieldValue::Blob(
            hex::decode(text).map_err(|e| invalid(format!("invalid blob hex: {}", e)))?,
        ),
        FieldType::SpatialObject => FieldValue::SpatialObject(
            hex::decode(text).map_err(|e| invalid(format!("invalid spatial hex: {}", e)))?,
        ),
        FieldType::Unknown => {
            return Err(invalid("unknown field type cannot carry a value".to_string()));
        }
    })
}

/// Render one record as a pipe-delimited row. Nulls render as empty cells.
pub fn render_row(schema: &RecordInfo, record: &Record) -> Result<String> {
    if record.len() != schema.num_fields() {
        return Err(YxdbError::Text(format!(
            "Record has {} values but the schema declares {} fields",
            record.len(),
            schema.num_fields()
        )));
    }
    let mut cells = Vec::with_capacity(record.len());
    for (field, value) in schema.fields.iter().zip(record.iter()) {
        let cell = match value {
            None => String::new(),
            Some(value) => render_value(field, value)?,
        };
        if cell.contains(['|', '\n', '\r']) {
            return Err(YxdbError::Text(format!(
                "Field {:?}: value {:?} cannot be represented without quoting",
                field.name, cell
            )));
        }
        cells.push(cell);
    }
    Ok(cells.join("|"))
}

fn render_value(field: &Field, value: &FieldValue) -> Result<String> {
    let mismatch = || {
        YxdbError::Text(format!(
            "Field {:?}: value {:?} does not match declared type {}",
            field.name,
            value,
            field.field_type.xml_name()
        ))
    };
    Ok(match (field.field_type, value) {
        (FieldType::Bool, FieldValue::Bool(b)) => b.to_string(),
        (FieldType::Byte, FieldValue::Byte(v)) => v.to_string(),
        (FieldType::Int16, FieldValue::Int16(v)) => v.to_string(),
        (FieldType::Int32, FieldValue::Int32(v)) => v.to_string(),
        (FieldType::Int64, FieldValue::Int64(v)) => v.to_string(),
        (FieldType::FixedDecimal, FieldValue::FixedDecimal(text)) => text.clone(),
        (FieldType::Float, FieldValue::Float(v)) => v.to_string(),
        (FieldType::Double, FieldValue::Double(v)) => v.to_string(),
        (FieldType::String, FieldValue::String(text)) => text.clone(),
        (FieldType::WString, FieldValue::WString(text)) => text.clone(),
        (FieldType::VString, FieldValue::VString(text)) => text.clone(),
        (FieldType::VWString, FieldValue::VWString(text)) => text.clone(),
        (FieldType::Date, FieldValue::Date(d)) => d.format(DATE_FORMAT).to_string(),
        (FieldType::Time, FieldValue::Time(t)) => t.format(TIME_FORMAT).to_string(),
        (FieldType::DateTime, FieldValue::DateTime(dt)) => dt.format(DATETIME_FORMAT).to_string(),
        (FieldType::Blob, FieldValue::Blob(bytes)) => hex::encode(bytes),
        (FieldType::SpatialObject, FieldValue::SpatialObject(bytes)) => hex::encode(bytes),
        _ => return Err(mismatch()),
    })
}

/// Iterator decoding pipe-delimited rows from a line source.
///
/// The input must contain rows only; callers split any schema line off
/// before constructing this stage.
pub struct TextRecords<B: BufRead> {
    schema: RecordInfo,
    lines: std::io::Lines<B>,
    failed: bool,
}

impl<B: BufRead> TextRecords<B> {
    pub fn new(schema: RecordInfo, input: B) -> Self {
        Self {
            schema,
            lines: input.lines(),
            failed: false,
        }
    }
}

impl<B: BufRead> Iterator for TextRecords<B> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => {
                self.failed = true;
                return Some(Err(YxdbError::Io(e)));
            }
        };
        let result = parse_row(&self.schema, &line);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
