//! The tagged value variant that backs every object in the content store,
//! every row, and every event payload (§3, §9 "Values as tagged variants").

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as DeError;
use serde::ser::Error as SerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A structured value: the only currency the content store, refs, rows and
/// events trade in. Maps use `BTreeMap` so that key order is always
/// codepoint-sorted, which is also what the canonical encoder requires —
/// iteration order and canonical order coincide for free.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`, an absent key, or JSON `null`.
    Null,
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// Any SQL `INTEGER`.
    Int(i64),
    /// Any SQL `REAL`.
    Real(f64),
    /// `TEXT`, `DATE`, `TIMESTAMP`, and quoted identifiers all carry this.
    String(String),
    /// An ordered sequence (row lists, `IN (...)`, index entries).
    Seq(Vec<Value>),
    /// A string-keyed mapping (rows, schemas, catalog entries).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Shorthand for building a row/object map from pairs.
    pub fn map(pairs: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Map(pairs.into_iter().collect())
    }

    /// Treat missing/undefined identically to an explicit null (§4.C).
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort numeric coercion used by comparisons and arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Best-effort string coercion used by `LIKE`/concatenation/display.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Real(r) => Some(format_real(*r)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            _ => None,
        }
    }

    /// Access as a map, if this is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Access as a sequence, if this is one.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    /// The type-rank used for cross-type ordering (§4.J: numeric < bool <
    /// string, then within-type natural order). `Null` sorts separately and
    /// is handled by callers (order_by nulls-first/last, index ordering).
    fn type_rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Real(_) => 0,
            Value::Bool(_) => 1,
            Value::String(_) => 2,
            Value::Null => 3,
            Value::Seq(_) => 4,
            Value::Map(_) => 5,
        }
    }
}

/// Shortest decimal round-trip for a real, collapsing to integer form when
/// the value has no fractional part (§4.C: "3" not "3.0").
pub fn format_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 && r.abs() < 1e15 {
        format!("{}", r as i64)
    } else {
        let mut s = format!("{}", r);
        if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
            s.push_str(".0");
        }
        s
    }
}

/// Ordering used by `ORDER BY`, index entries, and comparisons. Null is not
/// handled here — callers decide first/last placement explicitly (§4.J).
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Real(x), Value::Real(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
            let x = a.as_f64().unwrap_or(0.0);
            let y = b.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.type_rank().cmp(&b.type_rank()),
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(compare_values(self, other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", format_real(*r)),
            Value::String(s) => write!(f, "{}", s),
            Value::Seq(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        match j {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Real(r) => serde_json::Number::from_f64(r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Seq(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// Serde is implemented by round-tripping through `serde_json::Value` so that
// every serde consumer (WAL files, ref files, schema persistence) gets plain
// JSON on disk without a second hand-rolled wire format.
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let j: serde_json::Value = self.clone().into();
        j.serialize(serializer)
            .map_err(|e| S::Error::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let j = serde_json::Value::deserialize(deserializer)
            .map_err(|e| D::Error::custom(e.to_string()))?;
        Ok(Value::from(j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let v = Value::map([
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::String("x".into())),
        ]);
        let text = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn real_formats_as_integer_when_whole() {
        assert_eq!(format_real(3.0), "3");
        assert_eq!(format_real(3.5), "3.5");
    }

    #[test]
    fn ordering_is_numeric_then_bool_then_string() {
        assert_eq!(compare_values(&Value::Int(1), &Value::Bool(true)), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Bool(true), &Value::String("a".into())),
            Ordering::Less
        );
        assert_eq!(compare_values(&Value::Int(1), &Value::Int(2)), Ordering::Less);
    }
}
