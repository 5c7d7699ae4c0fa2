// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Canonical JSON rendering.
//!
//! The shell hashes and substring-matches JSON in two places: the audit
//! entry-hash input and the risk-keyword haystack.  Both must see the exact
//! same bytes for the same logical document, so this module is the single
//! canonicalisation routine used everywhere those bytes are produced.
//!
//! Canonical form: object keys sorted lexicographically at every depth,
//! compact separators (no whitespace), non-ASCII characters emitted verbatim.

use serde_json::Value;

use crate::types::Metadata;

/// Render a JSON value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Render a JSON object map in canonical form.
pub fn canonical_map(map: &Metadata) -> String {
    let mut out = String::new();
    write_object(&mut out, map);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(string) => write_string(out, string),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
    }
}

fn write_object(out: &mut String, map: &Metadata) {
    // serde_json's default map is ordered by insertion; sort keys here so the
    // rendering is independent of how the document was built.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (index, key) in keys.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        if let Some(value) = map.get(*key) {
            write_value(out, value);
        }
    }
    out.push('}');
}

/// JSON string escaping: the two mandatory escapes, short forms for common
/// control characters, `\u00XX` for the rest of the C0 range.  Everything
/// else passes through unescaped, non-ASCII included.
fn write_string(out: &mut String, string: &str) {
    out.push('"');
    for ch in string.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ch if (ch as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", ch as u32));
            }
            ch => out.push(ch),
        }
    }
    out.push('"');
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"z": true, "m": [1, 2]}});
        assert_eq!(canonical_json(&value), r#"{"a":{"m":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn test_compact_separators() {
        let value = json!({"k": [1, "two", null, false]});
        assert_eq!(canonical_json(&value), r#"{"k":[1,"two",null,false]}"#);
    }

    #[test]
    fn test_non_ascii_passes_through() {
        let value = json!({"note": "déployer à 100%"});
        assert_eq!(canonical_json(&value), "{\"note\":\"déployer à 100%\"}");
    }

    #[test]
    fn test_control_characters_escaped() {
        let value = json!({"k": "a\nb\t\"c\"\u{01}"});
        assert_eq!(canonical_json(&value), "{\"k\":\"a\\nb\\t\\\"c\\\"\\u0001\"}");
    }

    #[test]
    fn test_deterministic_across_insertion_orders() {
        let mut forward = Metadata::new();
        forward.insert("x".into(), json!(1));
        forward.insert("y".into(), json!(2));

        let mut backward = Metadata::new();
        backward.insert("y".into(), json!(2));
        backward.insert("x".into(), json!(1));

        assert_eq!(canonical_map(&forward), canonical_map(&backward));
    }

    #[test]
    fn test_empty_object_and_array() {
        assert_eq!(canonical_json(&json!({})), "{}");
        assert_eq!(canonical_json(&json!([])), "[]");
    }
}
