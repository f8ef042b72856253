//! Small helpers for pulling typed fields out of an event's `Value::Map`
//! payload, shared by the DDL/DML/index/catalog gates.

use gatedb_types::Value;

/// A required string field.
pub fn str_field(data: &Value, key: &str) -> anyhow::Result<String> {
    data.as_map()
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_string())
        .ok_or_else(|| anyhow::anyhow!("missing field: {key}"))
}

/// An optional string field, `None` if absent or null.
pub fn opt_str_field(data: &Value, key: &str) -> Option<String> {
    data.as_map().and_then(|m| m.get(key)).filter(|v| !v.is_null()).and_then(|v| v.as_string())
}

/// A boolean field, defaulting to `false` if absent.
pub fn bool_field(data: &Value, key: &str) -> bool {
    matches!(data.as_map().and_then(|m| m.get(key)), Some(Value::Bool(true)))
}

const NULL: Value = Value::Null;

/// A raw field, or `Value::Null` if absent.
pub fn raw_field<'a>(data: &'a Value, key: &str) -> &'a Value {
    data.as_map().and_then(|m| m.get(key)).unwrap_or(&NULL)
}
