use crate::error::CoreError;
use indexmap::IndexMap;
use std::fmt;

/// Maximum nesting depth for a [`Value`] tree (spec §3: "configured constant, >= 10").
pub const MAX_DEPTH: usize = 10;

/// An ordered map whose keys are buffers and values are [`Value`]s.
///
/// Backed by [`IndexMap`] so insertion order is preserved; `insert` on an
/// existing key replaces the value in place without reordering, matching
/// the map-insertion invariant in spec §3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedMap(IndexMap<String, Value>);

impl OrderedMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for OrderedMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The polymorphic value tree used by config responses, decoded EventStream
/// payloads, and recipe documents (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Buffer(Vec<u8>),
    List(Vec<Value>),
    Map(OrderedMap),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Buffer(s.into().into_bytes())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Buffer(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut OrderedMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Depth of this tree, where a scalar is depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            Value::Map(map) => 1 + map.iter().map(|(_, v)| v.depth()).max().unwrap_or(0),
            _ => 1,
        }
    }

    /// Validates that this tree does not exceed [`MAX_DEPTH`].
    pub fn check_depth(&self) -> Result<(), CoreError> {
        if self.depth() > MAX_DEPTH {
            return Err(CoreError::unsupported(format!(
                "value nesting depth exceeds {MAX_DEPTH}"
            )));
        }
        Ok(())
    }

    /// Navigates a key path (list of path segments), returning `NOENTRY` if
    /// any segment is missing.
    pub fn get_path(&self, path: &[impl AsRef<str>]) -> Result<&Value, CoreError> {
        let mut current = self;
        for segment in path {
            let map = current
                .as_map()
                .ok_or_else(|| CoreError::config("expected map while traversing key path"))?;
            current = map
                .get(segment.as_ref())
                .ok_or_else(|| CoreError::no_entry(format!("no such key: {}", segment.as_ref())))?;
        }
        Ok(current)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Buffer(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "{s:?}"),
                Err(_) => write!(f, "<{} raw bytes>", b.len()),
            },
            Value::List(_) => write!(f, "<list>"),
            Value::Map(_) => write!(f, "<map>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_order_and_replaces_in_place() {
        let mut m = OrderedMap::new();
        m.insert("a", Value::Int(1));
        m.insert("b", Value::Int(2));
        m.insert("a", Value::Int(3));
        let keys: Vec<_> = m.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn depth_counts_scalars_as_one() {
        assert_eq!(Value::Int(1).depth(), 1);
        let mut m = OrderedMap::new();
        m.insert("x", Value::Int(1));
        assert_eq!(Value::Map(m).depth(), 2);
    }

    #[test]
    fn depth_over_limit_is_rejected() {
        let mut v = Value::Int(0);
        for _ in 0..MAX_DEPTH + 2 {
            let mut m = OrderedMap::new();
            m.insert("k", v);
            v = Value::Map(m);
        }
        assert!(v.check_depth().is_err());
    }

    #[test]
    fn get_path_reports_no_entry() {
        let root = Value::Map(OrderedMap::new());
        let err = root.get_path(&["missing"]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NoEntry);
    }
}
