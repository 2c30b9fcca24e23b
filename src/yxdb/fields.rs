//! Per-field value codec.
//!
//! Encodes and decodes one typed, nullable field value against its [`Field`]
//! descriptor. Size and scale always come from the descriptor, never from
//! the value. Fixed-width types carry a trailing null-indicator byte
//! (`Bool` packs null into its single value byte instead); variable-length
//! types carry a u32 LE byte-length prefix with `0xFFFFFFFF` meaning null.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::{Result, YxdbError};
use super::models::{Field, FieldType, FieldValue};

/// Length-prefix sentinel for a null variable-length value.
const VAR_NULL: u32 = 0xFFFF_FFFF;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_WIDTH: usize = 10;
const TIME_WIDTH: usize = 8;
const DATETIME_WIDTH: usize = 19;

/// Encode one optional field value, appending its wire form to `out`.
pub fn encode(field: &Field, value: Option<&FieldValue>, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Some(value) => encode_present(field, value, out),
        None => encode_null(field, out),
    }
}

/// Decode one optional field value, advancing `cursor` past its wire form.
pub fn decode(field: &Field, cursor: &mut &[u8]) -> Result<Option<FieldValue>> {
    match field.field_type {
        FieldType::Bool => match take(cursor, 1, field)?[0] {
            0 => Ok(Some(FieldValue::Bool(false))),
            1 => Ok(Some(FieldValue::Bool(true))),
            2 => Ok(None),
            other => Err(value_error(field, format!("invalid bool byte {:#04x}", other))),
        },
        FieldType::Byte => {
            let bytes = take(cursor, 1, field)?;
            let value = bytes[0];
            finish_fixed(field, cursor, FieldValue::Byte(value))
        }
        FieldType::Int16 => {
            let mut bytes = take(cursor, 2, field)?;
            let value = bytes.read_i16::<LittleEndian>()?;
            finish_fixed(field, cursor, FieldValue::Int16(value))
        }
        FieldType::Int32 => {
            let mut bytes = take(cursor, 4, field)?;
            let value = bytes.read_i32::<LittleEndian>()?;
            finish_fixed(field, cursor, FieldValue::Int32(value))
        }
        FieldType::Int64 => {
            let mut bytes = take(cursor, 8, field)?;
            let value = bytes.read_i64::<LittleEndian>()?;
            finish_fixed(field, cursor, FieldValue::Int64(value))
        }
        FieldType::Float => {
            let mut bytes = take(cursor, 4, field)?;
            let value = bytes.read_f32::<LittleEndian>()?;
            finish_fixed(field, cursor, FieldValue::Float(value))
        }
        FieldType::Double => {
            let mut bytes = take(cursor, 8, field)?;
            let value = bytes.read_f64::<LittleEndian>()?;
            finish_fixed(field, cursor, FieldValue::Double(value))
        }
        FieldType::FixedDecimal => {
            let bytes = take(cursor, field.size_or_zero(), field)?;
            let text = ascii_until_nul(field, bytes)?.to_string();
            finish_fixed(field, cursor, FieldValue::FixedDecimal(text))
        }
        FieldType::String => {
            let bytes = take(cursor, field.size_or_zero(), field)?;
            let text = ascii_until_nul(field, bytes)?.to_string();
            finish_fixed(field, cursor, FieldValue::String(text))
        }
        FieldType::WString => {
            let bytes = take(cursor, 2 * field.size_or_zero(), field)?;
            let mut units: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
            if let Some(end) = units.iter().position(|&u| u == 0) {
                units.truncate(end);
            }
            let text = String::from_utf16(&units)
                .map_err(|_| value_error(field, "invalid UTF-16 code units".to_string()))?;
            finish_fixed(field, cursor, FieldValue::WString(text))
        }
        FieldType::Date => {
            let bytes = take(cursor, DATE_WIDTH, field)?;
            let value = parse_temporal(field, bytes, |s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT).map(FieldValue::Date)
            })?;
            finish_fixed(field, cursor, value)
        }
        FieldType::Time => {
            let bytes = take(cursor, TIME_WIDTH, field)?;
            let value = parse_temporal(field, bytes, |s| {
                NaiveTime::parse_from_str(s, TIME_FORMAT).map(FieldValue::Time)
            })?;
            finish_fixed(field, cursor, value)
        }
        FieldType::DateTime => {
            let bytes = take(cursor, DATETIME_WIDTH, field)?;
            let value = parse_temporal(field, bytes, |s| {
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map(FieldValue::DateTime)
            })?;
            finish_fixed(field, cursor, value)
        }
        FieldType::VString => match decode_var(field, cursor)? {
            None => Ok(None),
            Some(payload) => {
                let text = std::str::from_utf8(payload)
                    .map_err(|_| value_error(field, "invalid UTF-8 in vstring".to_string()))?;
                Ok(Some(FieldValue::VString(text.to_string())))
            }
        },
        FieldType::VWString => match decode_var(field, cursor)? {
            None => Ok(None),
            Some(payload) => {
                if payload.len() % 2 != 0 {
                    return Err(value_error(
                        field,
                        format!("vwstring payload length {} is odd", payload.len()),
                    ));
                }
                let units: Vec<u16> =
                    payload.chunks_exact(2).map(LittleEndian::read_u16).collect();
                let text = String::from_utf16(&units)
                    .map_err(|_| value_error(field, "invalid UTF-16 code units".to_string()))?;
                Ok(Some(FieldValue::VWString(text)))
            }
        },
        FieldType::Blob => Ok(decode_var(field, cursor)?.map(|p| FieldValue::Blob(p.to_vec()))),
        FieldType::SpatialObject => {
            Ok(decode_var(field, cursor)?.map(|p| FieldValue::SpatialObject(p.to_vec())))
        }
        FieldType::Unknown => Err(value_error(field, "unknown field type cannot be decoded".to_string())),
    }
}

fn encode_present(field: &Field, value: &FieldValue, out: &mut Vec<u8>) -> Result<()> {
    match (field.field_type, value) {
        (FieldType::Bool, FieldValue::Bool(b)) => {
            out.push(*b as u8);
        }
        (FieldType::Byte, FieldValue::Byte(v)) => {
            out.push(*v);
            out.push(0);
        }
        (FieldType::Int16, FieldValue::Int16(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            out.push(0);
        }
        (FieldType::Int32, FieldValue::Int32(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            out.push(0);
        }
        (FieldType::Int64, FieldValue::Int64(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            out.push(0);
        }
        (FieldType::Float, FieldValue::Float(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            out.push(0);
        }
        (FieldType::Double, FieldValue::Double(v)) => {
            out.extend_from_slice(&v.to_le_bytes());
            out.push(0);
        }
        (FieldType::FixedDecimal, FieldValue::FixedDecimal(text)) => {
            let scale = field.scale.unwrap_or(0);
            let formatted = format_decimal(field, text, scale)?;
            push_padded_ascii(field, &formatted, out)?;
            out.push(0);
        }
        (FieldType::String, FieldValue::String(text)) => {
            push_padded_ascii(field, text, out)?;
            out.push(0);
        }
        (FieldType::WString, FieldValue::WString(text)) => {
            let units: Vec<u16> = text.encode_utf16().collect();
            let size = field.size_or_zero();
            if units.len() > size {
                return Err(oversize_error(field, units.len(), size));
            }
            for unit in &units {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            for _ in units.len()..size {
                out.extend_from_slice(&[0, 0]);
            }
            out.push(0);
        }
        (FieldType::Date, FieldValue::Date(d)) => {
            push_temporal(field, &d.format(DATE_FORMAT).to_string(), DATE_WIDTH, out)?;
        }
        (FieldType::Time, FieldValue::Time(t)) => {
            push_temporal(field, &t.format(TIME_FORMAT).to_string(), TIME_WIDTH, out)?;
        }
        (FieldType::DateTime, FieldValue::DateTime(dt)) => {
            push_temporal(field, &dt.format(DATETIME_FORMAT).to_string(), DATETIME_WIDTH, out)?;
        }
        (FieldType::VString, FieldValue::VString(text)) => {
            encode_var(field, text.as_bytes(), text.len(), out)?;
        }
        (FieldType::VWString, FieldValue::VWString(text)) => {
            let units: Vec<u16> = text.encode_utf16().collect();
            let mut payload = Vec::with_capacity(2 * units.len());
            for unit in &units {
                payload.extend_from_slice(&unit.to_le_bytes());
            }
            encode_var(field, &payload, units.len(), out)?;
        }
        (FieldType::Blob, FieldValue::Blob(bytes)) => {
            encode_var(field, bytes, bytes.len(), out)?;
        }
        (FieldType::SpatialObject, FieldValue::SpatialObject(bytes)) => {
            encode_var(field, bytes, bytes.len(), out)?;
        }
        (FieldType::Unknown, _) => {
            return Err(value_error(field, "unknown field type cannot be encoded".to_string()));
        }
        (expected, got) => {
            return Err(value_error(
                field,
                format!("value {:?} does not match declared type {}", got, expected.xml_name()),
            ));
        }
    }
    Ok(())
}

fn encode_null(field: &Field, out: &mut Vec<u8>) -> Result<()> {
    match field.field_type {
        FieldType::Bool => out.push(2),
        FieldType::Byte => out.extend_from_slice(&[0, 1]),
        FieldType::Int16 => pad_null(out, 2),
        FieldType::Int32 | FieldType::Float => pad_null(out, 4),
        FieldType::Int64 | FieldType::Double => pad_null(out, 8),
        FieldType::FixedDecimal | FieldType::String => pad_null(out, field.size_or_zero()),
        FieldType::WString => pad_null(out, 2 * field.size_or_zero()),
        FieldType::Date => pad_null(out, DATE_WIDTH),
        FieldType::Time => pad_null(out, TIME_WIDTH),
        FieldType::DateTime => pad_null(out, DATETIME_WIDTH),
        FieldType::VString | FieldType::VWString | FieldType::Blob | FieldType::SpatialObject => {
            out.extend_from_slice(&VAR_NULL.to_le_bytes());
        }
        FieldType::Unknown => {
            return Err(value_error(field, "unknown field type cannot be encoded".to_string()));
        }
    }
    Ok(())
}

// Zeroed value bytes followed by the null-indicator byte.
fn pad_null(out: &mut Vec<u8>, width: usize) {
    out.extend(std::iter::repeat(0u8).take(width));
    out.push(1);
}

/// Consume the trailing null-indicator byte of a fixed-width field.
fn finish_fixed(
    field: &Field,
    cursor: &mut &[u8],
    value: FieldValue,
) -> Result<Option<FieldValue>> {
    match take(cursor, 1, field)?[0] {
        0 => Ok(Some(value)),
        1 => Ok(None),
        other => Err(value_error(field, format!("invalid null indicator {:#04x}", other))),
    }
}

fn decode_var<'a>(field: &Field, cursor: &mut &'a [u8]) -> Result<Option<&'a [u8]>> {
    let mut prefix = take(cursor, 4, field)?;
    let len = prefix.read_u32::<LittleEndian>()?;
    if len == VAR_NULL {
        return Ok(None);
    }
    Ok(Some(take(cursor, len as usize, field)?))
}

fn encode_var(field: &Field, payload: &[u8], units: usize, out: &mut Vec<u8>) -> Result<()> {
    let size = field.size_or_zero();
    if units > size {
        return Err(oversize_error(field, units, size));
    }
    if payload.len() as u64 >= VAR_NULL as u64 {
        return Err(value_error(field, "payload too large for u32 length prefix".to_string()));
    }
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

fn take<'a>(cursor: &mut &'a [u8], n: usize, field: &Field) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(YxdbError::Record(format!(
            "Truncated input for field {:?}: need {} bytes, have {}",
            field.name,
            n,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn ascii_until_nul<'a>(field: &Field, bytes: &'a [u8]) -> Result<&'a str> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map_err(|_| value_error(field, "invalid UTF-8 in fixed-width text".to_string()))
}

fn parse_temporal<T>(
    field: &Field,
    bytes: &[u8],
    parse: impl FnOnce(&str) -> chrono::format::ParseResult<T>,
) -> Result<T> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| value_error(field, "non-ASCII bytes in temporal field".to_string()))?;
    parse(text).map_err(|e| value_error(field, format!("invalid temporal value {:?}: {}", text, e)))
}

/// Rewrite a decimal string to exactly `scale` fractional digits.
///
/// Extra fractional digits are truncated; missing ones are zero-filled.
fn format_decimal(field: &Field, text: &str, scale: u32) -> Result<String> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !numeric(int_part) || !(frac_part.is_empty() || numeric(frac_part)) {
        return Err(value_error(field, format!("invalid decimal value {:?}", text)));
    }
    let scale = scale as usize;
    if scale == 0 {
        return Ok(format!("{}{}", sign, int_part));
    }
    let mut frac: String = frac_part.chars().take(scale).collect();
    while frac.len() < scale {
        frac.push('0');
    }
    Ok(format!("{}{}.{}", sign, int_part, frac))
}

// Years outside 0000..=9999 would break the fixed ASCII width.
fn push_temporal(field: &Field, text: &str, width: usize, out: &mut Vec<u8>) -> Result<()> {
    if text.len() != width {
        return Err(value_error(
            field,
            format!("temporal value {:?} does not fit the {}-byte layout", text, width),
        ));
    }
    out.extend_from_slice(text.as_bytes());
    out.push(0);
    Ok(())
}

fn push_padded_ascii(field: &Field, text: &str, out: &mut Vec<u8>) -> Result<()> {
    let size = field.size_or_zero();
    let bytes = text.as_bytes();
    if bytes.len() > size {
        return Err(oversize_error(field, bytes.len(), size));
    }
    if bytes.contains(&0) {
        return Err(value_error(field, "embedded NUL in fixed-width text".to_string()));
    }
    out.extend_from_slice(bytes);
    out.extend(std::iter::repeat(0u8).take(size - bytes.len()));
    Ok(())
}

fn value_error(field: &Field, reason: String) -> YxdbError {
    YxdbError::Record(format!("Field {:?}: {}", field.name, reason))
}

fn oversize_error(field: &Field, got: usize, size: usize) -> YxdbError {
    YxdbError::Record(format!(
        "Field {:?}: value of {} code units exceeds declared size {}",
        field.name, got, size
    ))
}
