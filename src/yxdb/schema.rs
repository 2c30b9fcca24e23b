//! XML record-schema codec.
//!
//! The on-disk schema is a UTF-16LE XML document terminated by a newline
//! and a NUL, each as a UTF-16 code unit:
//!
//! ```xml
//! <MetaInfo><RecordInfo><Field name="…" type="…" size="…"/>…</RecordInfo></MetaInfo>
//! ```
//!
//! The header's `metaInfoLength` counts UTF-16 code units, so the byte
//! span of the schema is twice that value.

use encoding_rs::UTF_16LE;
use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::error::{Result, YxdbError};
use super::models::{Field, FieldType, RecordInfo};

/// Decode and parse the schema from its raw UTF-16LE byte span.
pub fn parse(bytes: &[u8]) -> Result<RecordInfo> {
    if bytes.len() % 2 != 0 {
        return Err(YxdbError::Schema(format!(
            "Schema spans {} bytes, not a whole number of UTF-16 code units",
            bytes.len()
        )));
    }
    let (decoded, _, _) = UTF_16LE.decode(bytes);
    let xml = decoded.trim_end_matches(['\0', '\n']);
    parse_xml(xml)
}

/// Parse the decoded schema XML document.
pub fn parse_xml(xml: &str) -> Result<RecordInfo> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut record_info_count = 0usize;
    let mut in_record_info = false;
    let mut fields: Vec<Field> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                match e.name().as_ref() {
                    b"RecordInfo" => {
                        record_info_count += 1;
                        in_record_info = true;
                    }
                    b"Field" => {
                        if in_record_info {
                            fields.push(parse_field(&e)?);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"RecordInfo" {
                    in_record_info = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(YxdbError::Schema(format!("Malformed schema XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if record_info_count != 1 {
        return Err(YxdbError::Schema(format!(
            "Expected exactly one RecordInfo element, found {}",
            record_info_count
        )));
    }
    debug!("parsed schema with {} fields", fields.len());
    RecordInfo::new(fields)
}

fn parse_field(element: &BytesStart<'_>) -> Result<Field> {
    let mut name: Option<String> = None;
    let mut field_type: Option<FieldType> = None;
    let mut size: Option<u32> = None;
    let mut scale: Option<u32> = None;
    let mut description: Option<String> = None;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| YxdbError::Schema(format!("Malformed Field attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| YxdbError::Schema(format!("Malformed Field attribute value: {}", e)))?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"type" => field_type = Some(FieldType::from_xml_name(&value)?),
            b"size" => size = Some(parse_uint_attr("size", &value)?),
            b"scale" => scale = Some(parse_uint_attr("scale", &value)?),
            b"description" => description = Some(value.into_owned()),
            other => {
                return Err(YxdbError::Schema(format!(
                    "Unknown Field attribute {:?}",
                    String::from_utf8_lossy(other)
                )));
            }
        }
    }

    let name = name.ok_or_else(|| YxdbError::Schema("Field element without a name".to_string()))?;
    let field_type = field_type
        .ok_or_else(|| YxdbError::Schema(format!("Field {:?} without a type", name)))?;

    let mut field = Field::new(name, field_type);
    if let Some(size) = size {
        field = field.with_size(size);
    }
    if let Some(scale) = scale {
        field = field.with_scale(scale);
    }
    if let Some(description) = description {
        field = field.with_description(description);
    }
    field.validate()
}

fn parse_uint_attr(attr: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| YxdbError::Schema(format!("Invalid {} attribute {:?}", attr, value)))
}

/// Render the schema to its on-disk UTF-16LE byte form, terminator included.
pub fn render(schema: &RecordInfo) -> Result<Vec<u8>> {
    let xml = render_xml(schema)?;
    let mut out = Vec::with_capacity(2 * (xml.len() + 2));
    for unit in xml.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    // Trailing newline + NUL, one UTF-16 code unit each.
    out.extend_from_slice(&[0x0A, 0x00, 0x00, 0x00]);
    Ok(out)
}

/// Render the schema XML document as text.
pub fn render_xml(schema: &RecordInfo) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    let render_err = |e| YxdbError::Schema(format!("Failed to render schema XML: {}", e));

    writer.write_event(Event::Start(BytesStart::new("MetaInfo"))).map_err(render_err)?;
    writer.write_event(Event::Start(BytesStart::new("RecordInfo"))).map_err(render_err)?;
    for field in &schema.fields {
        let mut element = BytesStart::new("Field");
        element.push_attribute(("name", field.name.as_str()));
        element.push_attribute(("type", field.field_type.xml_name()));
        if let Some(size) = field.size {
            element.push_attribute(("size", size.to_string().as_str()));
        }
        if let Some(scale) = field.scale {
            element.push_attribute(("scale", scale.to_string().as_str()));
        }
        if let Some(description) = &field.description {
            element.push_attribute(("description", description.as_str()));
        }
        writer.write_event(Event::Empty(element)).map_err(render_err)?;
    }
    writer.write_event(Event::End(BytesEnd::new("RecordInfo"))).map_err(render_err)?;
    writer.write_event(Event::End(BytesEnd::new("MetaInfo"))).map_err(render_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|_| YxdbError::Schema("Rendered schema is not valid UTF-8".to_string()))
}
