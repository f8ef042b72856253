//! Deterministic canonical encoding of [`Value`]s (§4.C) and the SHA-256
//! content hash derived from it (§3, §4.A).
//!
//! Grounded on `toka-store-core::causal_hash` (hash payload bytes plus
//! sorted parent digests for determinism) but generalized: gatedb hashes
//! the canonical *text* encoding of a value directly, with SHA-256 instead
//! of blake3, since content addressing here is tied to a specific,
//! human-legible byte format rather than a MessagePack payload.

use gatedb_types::{format_real, Value};

use crate::hash::sha256_hex;

/// Encode a value into the deterministic byte string used for hashing.
/// Two structurally equal values always produce byte-identical output
/// (§3 I3, §8 P1).
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Real(r) => out.push_str(&format_real(*r)),
        Value::String(s) => write_string(s, out),
        Value::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            // BTreeMap already iterates in codepoint-sorted key order.
            // Keys whose value is null are omitted — this is how gatedb
            // represents "undefined": a value is either present (and
            // encoded, even if explicitly Null at the top level) or it is
            // a map entry that doesn't survive canonicalization at all.
            let mut first = true;
            for (k, v) in map.iter() {
                if matches!(v, Value::Null) {
                    continue;
                }
                if !first {
                    out.push(',');
                }
                first = false;
                write_string(k, out);
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Lowercase hex SHA-256 of a value's canonical encoding.
pub fn content_hash(value: &Value) -> String {
    sha256_hex(canonicalize(value).as_bytes())
}

/// Parse a value back out of its canonical encoding. The grammar is a
/// strict subset of JSON (sorted keys, no whitespace, no ambiguity) so
/// this just delegates to `serde_json` rather than hand-rolling a second
/// parser for the same literals `write_canonical` already produces.
pub fn parse_canonical(text: &str) -> Result<Value, crate::error::StoreError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(Value::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatedb_types::Value;

    #[test]
    fn maps_are_key_sorted_and_drop_null_values() {
        let v = Value::map([
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Int(1)),
            ("c".to_string(), Value::Null),
        ]);
        assert_eq!(canonicalize(&v), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn deterministic_across_construction_order() {
        let a = Value::map([("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Int(2))]);
        let b = Value::map([("b".to_string(), Value::Int(2)), ("a".to_string(), Value::Int(1))]);
        assert_eq!(canonicalize(&a), canonicalize(&b));
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn real_collapses_to_integer_form() {
        assert_eq!(canonicalize(&Value::Real(3.0)), "3");
        assert_eq!(canonicalize(&Value::Real(3.5)), "3.5");
    }

    #[test]
    fn strings_escape_quotes_and_control_chars() {
        let v = Value::String("a\"b\\c\nd".to_string());
        assert_eq!(canonicalize(&v), r#""a\"b\\c\nd""#);
    }

    #[test]
    fn hash_is_stable_across_runs() {
        let v = Value::String("Alice".into());
        let h1 = content_hash(&v);
        let h2 = content_hash(&v);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn round_trips_through_parse_canonical() {
        let v = Value::map([
            ("id".to_string(), Value::Int(1)),
            ("name".to_string(), Value::String("Alice".into())),
            ("tags".to_string(), Value::Seq(vec![Value::String("a".into())])),
        ]);
        let parsed = parse_canonical(&canonicalize(&v)).unwrap();
        assert_eq!(parsed, v);
    }
}
