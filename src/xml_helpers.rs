//! Shared XML attribute helpers for the XLSX and ODS readers.
//!
//! Attribute keys may be namespace-prefixed (`r:id`, `table:name`); the
//! `_local` variants match on the local name only.

use quick_xml::events::BytesStart;

/// Extract a string attribute value by exact key.
///
/// Returns `None` if the attribute is missing or not valid UTF-8.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(ToString::to_string);
        }
    }
    None
}

/// Extract a string attribute by local name (ignoring namespace prefix).
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return std::str::from_utf8(&attr.value).ok().map(ToString::to_string);
        }
    }
    None
}

/// Extract a `u32` attribute value by exact key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Extract a `u32` attribute by local name.
pub fn attr_u32_local(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string_local(e, key).and_then(|s| s.trim().parse().ok())
}

/// Resolve the five predefined XML entities and numeric character references.
///
/// Used for attribute values, which quick-xml hands back escaped.
pub fn unescape_attr(value: &str) -> String {
    match quick_xml::escape::unescape(value) {
        Ok(s) => s.into_owned(),
        Err(_) => value.to_string(),
    }
}
