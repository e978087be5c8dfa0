//! Plain (untagged) JSON <-> [`Value`] conversion for the external IPC/IoT
//! boundary (spec §4.E payloads, e.g. `{"keyPath": ["system","thingName"]}`).
//!
//! [`crate::serde_value`] is a *tagged* wire format private to the core-bus
//! RPC envelope and cannot round-trip a bare JSON string or number; this
//! module is the untagged mapping IPC operation payloads actually use.
//! JSON decoding itself remains `serde_json`'s job (a black box per spec
//! §1); this only maps the already-decoded tree onto [`Value`].

use crate::value::{OrderedMap, Value};
use serde_json::{Number, Value as Json};

/// Converts a decoded `serde_json::Value` into [`Value`], treating JSON
/// strings as UTF-8 buffers and JSON numbers as `Int` when they fit losslessly,
/// `Float` otherwise.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => from_json_number(n),
        Json::String(s) => Value::str(s),
        Json::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        Json::Object(map) => {
            let mut out = OrderedMap::new();
            for (k, v) in map {
                out.insert(k, from_json(v));
            }
            Value::Map(out)
        }
    }
}

fn from_json_number(n: Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else {
        Value::Float(n.as_f64().unwrap_or(0.0))
    }
}

/// Converts a [`Value`] into a `serde_json::Value` ready for `to_vec`/`to_string`,
/// the inverse of [`from_json`]. A `Buffer` that is not valid UTF-8 is
/// rendered as a JSON string containing the Latin-1 bytes, since plain JSON
/// has no opaque-byte type (callers that need exact byte fidelity should use
/// [`crate::serde_value`]'s tagged format instead).
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::Buffer(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Json::String(s.to_string()),
            Err(_) => Json::String(bytes.iter().map(|&b| b as char).collect()),
        },
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                out.insert(k.to_string(), to_json(v));
            }
            Json::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_object_round_trips() {
        let json: Json = serde_json::from_str(
            r#"{"keyPath":["system","thingName"],"count":3,"ok":true}"#,
        )
        .unwrap();
        let value = from_json(json.clone());
        let back = to_json(&value);
        assert_eq!(json, back);
    }

    #[test]
    fn json_string_becomes_a_buffer() {
        let value = from_json(Json::String("hello".into()));
        assert_eq!(value.as_str(), Some("hello"));
    }
}
