//! `serde` support for [`Value`], used by core-bus/IPC payload encoding.
//!
//! JSON has no native byte-string type and no way to tell a bare map from
//! one of our typed variants, so `Buffer`/`Int`/`Float`/`Map` are written as
//! single-key objects (`{"$b": "<base64>"}`, `{"$i": N}`, ...). This is an
//! internal wire format, not the Greengrass IPC JSON protocol (which stays
//! a black-box decode step at the broker boundary, spec §1 Non-goals).

use crate::value::{OrderedMap, Value};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$i", i)?;
                map.end()
            }
            Value::Float(v) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$f", v)?;
                map.end()
            }
            Value::Buffer(bytes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$b", &base64_encode(bytes))?;
                map.end()
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry("$m", &OrderedMapSer(map))?;
                out.end()
            }
        }
    }
}

struct OrderedMapSer<'a>(&'a OrderedMap);

impl Serialize for OrderedMapSer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in self.0.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a null, bool, or one of the $i/$f/$b/$m tagged objects")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let key: String = match access.next_key()? {
            Some(k) => k,
            None => return Ok(Value::Map(OrderedMap::new())),
        };
        match key.as_str() {
            "$i" => Ok(Value::Int(access.next_value()?)),
            "$f" => Ok(Value::Float(access.next_value()?)),
            "$b" => {
                let encoded: String = access.next_value()?;
                let bytes = base64_decode(&encoded).map_err(de::Error::custom)?;
                Ok(Value::Buffer(bytes))
            }
            "$m" => {
                let entries: std::collections::BTreeMap<String, Value> = access.next_value()?;
                let mut map = OrderedMap::new();
                for (k, v) in entries {
                    map.insert(k, v);
                }
                Ok(Value::Map(map))
            }
            other => {
                let mut map = OrderedMap::new();
                map.insert(other.to_string(), access.next_value()?);
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    map.insert(k, v);
                }
                Ok(Value::Map(map))
            }
        }
    }
}

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        let n = (b0 as u32) << 16 | (b1 as u32) << 8 | b2 as u32;
        out.push(ALPHABET[(n >> 18 & 0x3F) as usize] as char);
        out.push(ALPHABET[(n >> 12 & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 { ALPHABET[(n >> 6 & 0x3F) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { ALPHABET[(n & 0x3F) as usize] as char } else { '=' });
    }
    out
}

fn base64_decode(s: &str) -> Result<Vec<u8>, &'static str> {
    fn val(c: u8) -> Result<u32, &'static str> {
        match c {
            b'A'..=b'Z' => Ok((c - b'A') as u32),
            b'a'..=b'z' => Ok((c - b'a' + 26) as u32),
            b'0'..=b'9' => Ok((c - b'0' + 52) as u32),
            b'+' => Ok(62),
            b'/' => Ok(63),
            _ => Err("invalid base64 character"),
        }
    }

    let s = s.as_bytes();
    if s.len() % 4 != 0 {
        return Err("base64 input length must be a multiple of 4");
    }
    let mut out = Vec::with_capacity(s.len() / 4 * 3);
    for chunk in s.chunks(4) {
        let pad = chunk.iter().filter(|&&c| c == b'=').count();
        let mut n = 0u32;
        for &c in chunk {
            n = n << 6 | if c == b'=' { 0 } else { val(c)? };
        }
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json_for_every_variant() {
        let mut map = OrderedMap::new();
        map.insert("name", Value::str("thing"));
        map.insert("nested", Value::List(vec![Value::Int(1), Value::Bool(true), Value::Null]));
        let original = Value::Map(map);

        let json = serde_json::to_string(&original).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn buffer_round_trips_arbitrary_bytes() {
        let original = Value::Buffer(vec![0, 1, 2, 253, 254, 255]);
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }
}
