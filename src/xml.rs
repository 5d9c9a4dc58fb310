//! Shared quick-xml helpers for the XML-based parsers.

use std::io::BufRead;

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{ConvertError, Result};

/// Get a required attribute value.
pub(crate) fn get_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).map_err(|_| {
                ConvertError::invalid_attribute(name, element_name(e), "invalid UTF-8")
            });
        }
    }
    Err(ConvertError::missing_attribute(name, element_name(e)))
}

/// Get an optional attribute value.
pub(crate) fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).ok();
        }
    }
    None
}

/// Parse a float attribute, returning None if not present or invalid.
pub(crate) fn parse_float_attr(e: &BytesStart, name: &str) -> Option<f64> {
    get_attribute_opt(e, name).and_then(|s| s.parse().ok())
}

/// Parse a space-separated list of floats.
pub(crate) fn parse_float_list(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| ConvertError::XmlParse(format!("invalid number in list: {s}")))
        })
        .collect()
}

/// Parse a space-separated vector3 string.
pub(crate) fn parse_vector3(s: &str) -> Result<Vector3<f64>> {
    let parts = parse_float_list(s)?;
    if parts.len() != 3 {
        return Err(ConvertError::XmlParse(format!(
            "expected 3 values in vector, got {}: {s}",
            parts.len()
        )));
    }
    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

/// Get element name as string for error messages.
pub(crate) fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

/// Skip an element and all its children.
pub(crate) fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => {
                depth += 1;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(ConvertError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

/// Format a float the way robot XML files expect: no scientific notation
/// surprises, no trailing leftovers from the default `Display`.
pub(crate) fn fmt_float(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

/// Format a vector3 as a space-separated attribute value.
pub(crate) fn fmt_vector3(v: &Vector3<f64>) -> String {
    format!("{} {} {}", fmt_float(v.x), fmt_float(v.y), fmt_float(v.z))
}
