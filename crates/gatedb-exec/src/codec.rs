//! Round-tripping typed structures (`Schema`, `Column`, ...) through
//! [`gatedb_types::Value`] via `serde_json::Value` as the common wire
//! shape, so every stored object is still plain canonical-encodable data
//! rather than a second hand-rolled format.

use gatedb_types::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize `t` into a `Value`.
pub fn to_value<T: Serialize>(t: &T) -> Value {
    Value::from(serde_json::to_value(t).expect("in-memory structures always serialize"))
}

/// Deserialize a `Value` back into `T`.
pub fn from_value<T: DeserializeOwned>(v: &Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::from(v.clone()))
}
