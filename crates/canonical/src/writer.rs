use serde_json::Value;

use crate::error::CanonicalisationError;
use crate::key::CanonicalKey;
use crate::number::write_number;

/// Canonicalise a parsed JSON value.
///
/// Total for every [`Value`]: non-finite numbers and non-string keys cannot be
/// represented in one.
pub fn canonicalise(value: &Value) -> CanonicalKey {
    let mut out = String::with_capacity(64);
    write_value(&mut out, value);
    CanonicalKey::from_canonical(out)
}

/// Parse pre-serialized JSON text, then canonicalise the value it denotes.
///
/// The text is never used verbatim, so differently formatted texts for the
/// same value produce the same key.
pub fn canonicalise_str(text: &str) -> Result<CanonicalKey, CanonicalisationError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(canonicalise(&value))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => write_number(out, number),
        Value::String(text) => write_string(out, text),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sorted here rather than relying on the map's iteration order,
            // which changes with serde_json's `preserve_order` feature.
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (idx, (key, member)) in members.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, member);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, text: &str) {
    out.reserve(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
