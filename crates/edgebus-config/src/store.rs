//! An in-memory reference `gg_config` backend: timestamp-ordered,
//! type-stable key-path store with subtree subscriptions.
//!
//! The real config store is an external process (spec §1 Non-goals), but
//! the testable properties in spec §3/§8 (timestamp-ordered merges, type
//! stomping rejected, subscriptions fire on nested writes) need something
//! to run those tests against, so this crate carries a complete, if
//! minimal, implementation of the same contract.

use edgebus_core::{CoreError, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone)]
enum Node {
    Leaf { value: Value, timestamp: i64 },
    Parent { children: IndexMap<String, Node> },
}

impl Node {
    fn empty_parent() -> Self {
        Node::Parent { children: IndexMap::new() }
    }

    fn to_value(&self) -> Value {
        match self {
            Node::Leaf { value, .. } => value.clone(),
            Node::Parent { children } => {
                let mut map = edgebus_core::OrderedMap::new();
                for (k, v) in children {
                    map.insert(k.clone(), v.to_value());
                }
                Value::Map(map)
            }
        }
    }
}

struct Subscriber {
    prefix: Vec<String>,
    sender: UnboundedSender<Vec<String>>,
}

/// The store itself. Cheap to clone (an `Arc` internally) so the core-bus
/// server and any in-process callers can share one instance.
#[derive(Clone)]
pub struct ConfigStore {
    inner: std::sync::Arc<RwLock<StoreInner>>,
}

struct StoreInner {
    root: Node,
    subscribers: Vec<Subscriber>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(RwLock::new(StoreInner {
                root: Node::empty_parent(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// spec §4.D `read`: the subtree rooted at `key_path`, or `NOENTRY`.
    pub fn read(&self, key_path: &[String]) -> Result<Value, CoreError> {
        let inner = self.inner.read();
        let node = navigate(&inner.root, key_path)?;
        Ok(node.to_value())
    }

    /// spec §4.D `read_str`: `read`, requiring the result to be a buffer.
    pub fn read_str(&self, key_path: &[String]) -> Result<Vec<u8>, CoreError> {
        match self.read(key_path)? {
            Value::Buffer(b) => Ok(b),
            _ => Err(CoreError::config("configuration value is not a string")),
        }
    }

    /// spec §4.D `list`: immediate children names. `INVALID` on a leaf key.
    pub fn list(&self, key_path: &[String]) -> Result<Vec<String>, CoreError> {
        let inner = self.inner.read();
        let node = navigate(&inner.root, key_path)?;
        match node {
            Node::Parent { children } => Ok(children.keys().cloned().collect()),
            Node::Leaf { .. } => Err(CoreError::invalid("key is a leaf, not a container")),
        }
    }

    /// spec §4.D `write`: timestamp-ordered, type-stable merge. Notifies
    /// every subscriber whose prefix is an ancestor of (or equal to)
    /// `key_path` with the full path written.
    pub fn write(&self, key_path: &[String], value: Value, timestamp: i64) -> Result<(), CoreError> {
        if key_path.len() > edgebus_core::MAX_DEPTH {
            return Err(CoreError::unsupported("key path depth exceeds maximum handled"));
        }
        {
            let mut inner = self.inner.write();
            merge_at(&mut inner.root, key_path, &value, timestamp)?;
        }
        self.notify(key_path);
        Ok(())
    }

    /// spec §4.D `delete`: recursive; deleting a non-existent key is a
    /// no-op (idempotent).
    pub fn delete(&self, key_path: &[String]) -> Result<(), CoreError> {
        if key_path.is_empty() {
            return Err(CoreError::invalid("cannot delete the config root"));
        }
        {
            let mut inner = self.inner.write();
            delete_at(&mut inner.root, key_path);
        }
        self.notify(key_path);
        Ok(())
    }

    /// spec §4.D `subscribe`: registers a watcher; every write whose path
    /// falls under (or at) `key_path` delivers the written path. No
    /// initial snapshot is pushed.
    pub fn subscribe(&self, key_path: &[String]) -> tokio::sync::mpsc::UnboundedReceiver<Vec<String>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.inner.write().subscribers.push(Subscriber { prefix: key_path.to_vec(), sender: tx });
        rx
    }

    fn notify(&self, written_path: &[String]) {
        let inner = self.inner.read();
        for sub in &inner.subscribers {
            if is_prefix_of(&sub.prefix, written_path) || is_prefix_of(written_path, &sub.prefix) {
                let _ = sub.sender.send(written_path.to_vec());
            }
        }
    }
}

fn is_prefix_of(prefix: &[String], path: &[String]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path.iter()).all(|(a, b)| a == b)
}

fn navigate<'a>(root: &'a Node, key_path: &[String]) -> Result<&'a Node, CoreError> {
    let mut current = root;
    for segment in key_path {
        match current {
            Node::Parent { children } => {
                current = children
                    .get(segment)
                    .ok_or_else(|| CoreError::no_entry(format!("no such key: {segment}")))?;
            }
            Node::Leaf { .. } => {
                return Err(CoreError::no_entry("path continues past a leaf value"));
            }
        }
    }
    Ok(current)
}

fn delete_at(root: &mut Node, key_path: &[String]) {
    let (last, ancestors) = match key_path.split_last() {
        Some(split) => split,
        None => return,
    };
    let mut current = root;
    for segment in ancestors {
        match current {
            Node::Parent { children } => match children.get_mut(segment) {
                Some(child) => current = child,
                None => return, // nonexistent ancestor: nothing to delete
            },
            Node::Leaf { .. } => return,
        }
    }
    if let Node::Parent { children } = current {
        children.shift_remove(last);
    }
}

/// Writes `value` at `key_path` under `root`, applying the merge/stomp
/// rules from spec §3's invariants list.
fn merge_at(root: &mut Node, key_path: &[String], value: &Value, timestamp: i64) -> Result<(), CoreError> {
    if key_path.is_empty() {
        merge_value(root, value, timestamp)?;
        return Ok(());
    }

    let (head, rest) = (&key_path[0], &key_path[1..]);
    let children = match root {
        Node::Parent { children } => children,
        Node::Leaf { .. } => {
            return Err(CoreError::config("key is a value and cannot also be a parent"));
        }
    };

    let child = children.entry(head.clone()).or_insert_with(Node::empty_parent);
    merge_at(child, rest, value, timestamp)
}

fn merge_value(node: &mut Node, value: &Value, timestamp: i64) -> Result<(), CoreError> {
    match value {
        Value::Map(m) => match node {
            Node::Parent { children } => {
                if m.is_empty() {
                    return Ok(()); // writing {} over a map is a no-op
                }
                for (k, v) in m.iter() {
                    let child = children.entry(k.to_string()).or_insert_with(Node::empty_parent);
                    merge_value(child, v, timestamp)?;
                }
                Ok(())
            }
            Node::Leaf { .. } => {
                if m.is_empty() {
                    return Ok(());
                }
                Err(CoreError::config("cannot write a map over an existing leaf value"))
            }
        },
        scalar => match node {
            Node::Parent { children } => {
                if children.is_empty() {
                    *node = Node::Leaf { value: scalar.clone(), timestamp };
                    Ok(())
                } else {
                    Err(CoreError::config("cannot write a leaf value over an existing map"))
                }
            }
            Node::Leaf { value: existing, timestamp: existing_ts } => {
                if timestamp < *existing_ts {
                    return Ok(()); // older write silently ignored
                }
                *existing = scalar.clone();
                *existing_ts = timestamp;
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn older_timestamp_is_ignored_equal_and_newer_overwrite() {
        let store = ConfigStore::new();
        let p = path(&["services", "foo", "version"]);
        store.write(&p, Value::str("1.0"), 10).unwrap();
        store.write(&p, Value::str("0.9"), 5).unwrap();
        assert_eq!(store.read(&p).unwrap().as_str(), Some("1.0"));

        store.write(&p, Value::str("1.1"), 10).unwrap();
        assert_eq!(store.read(&p).unwrap().as_str(), Some("1.1"));

        store.write(&p, Value::str("2.0"), 20).unwrap();
        assert_eq!(store.read(&p).unwrap().as_str(), Some("2.0"));
    }

    #[test]
    fn map_over_leaf_and_leaf_over_map_are_rejected() {
        let store = ConfigStore::new();
        let p = path(&["a", "b"]);
        store.write(&p, Value::Int(1), 1).unwrap();

        let mut m = edgebus_core::OrderedMap::new();
        m.insert("x", Value::Int(2));
        let err = store.write(&p, Value::Map(m), 2).unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Config);

        let p2 = path(&["c"]);
        let mut m2 = edgebus_core::OrderedMap::new();
        m2.insert("y", Value::Int(1));
        store.write(&p2, Value::Map(m2), 1).unwrap();
        let err2 = store.write(&p2, Value::Int(5), 2).unwrap_err();
        assert_eq!(err2.kind, edgebus_core::ErrorKind::Config);
    }

    #[test]
    fn empty_map_over_nonempty_map_is_a_no_op() {
        let store = ConfigStore::new();
        let p = path(&["a"]);
        let mut m = edgebus_core::OrderedMap::new();
        m.insert("x", Value::Int(1));
        store.write(&p, Value::Map(m), 1).unwrap();

        store.write(&p, Value::Map(edgebus_core::OrderedMap::new()), 2).unwrap();
        assert_eq!(store.list(&p).unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn list_on_leaf_is_invalid_and_missing_key_is_no_entry() {
        let store = ConfigStore::new();
        let p = path(&["a"]);
        store.write(&p, Value::Int(1), 1).unwrap();
        let err = store.list(&p).unwrap_err();
        assert_eq!(err.kind, edgebus_core::ErrorKind::Invalid);

        let err2 = store.read(&path(&["missing"])).unwrap_err();
        assert_eq!(err2.kind, edgebus_core::ErrorKind::NoEntry);
    }

    #[test]
    fn delete_is_idempotent_on_missing_keys() {
        let store = ConfigStore::new();
        store.delete(&path(&["never", "existed"])).unwrap();
    }

    #[tokio::test]
    async fn subscription_fires_on_nested_descendant_writes_with_no_initial_snapshot() {
        let store = ConfigStore::new();
        let mut rx = store.subscribe(&path(&["services", "foo"]));

        // no initial snapshot
        assert!(rx.try_recv().is_err());

        store.write(&path(&["services", "foo", "config", "nested"]), Value::Int(1), 1).unwrap();
        let changed = rx.recv().await.unwrap();
        assert_eq!(changed, path(&["services", "foo", "config", "nested"]));
    }
}
