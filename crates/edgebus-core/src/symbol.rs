use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// A process-wide interned string with O(1) equality (spec §9: "dynamic
/// dispatch via callbacks ... keyed by interned symbols").
///
/// Cloning a `Symbol` is a pointer copy; equality compares the interned
/// pointer, not the string contents.
#[derive(Clone, Eq)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn intern(s: &str) -> Self {
        table().intern(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl std::fmt::Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Symbol({:?})", self.0)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

struct SymbolTable {
    entries: RwLock<HashMap<Box<str>, Arc<str>>>,
}

impl SymbolTable {
    fn intern(&self, s: &str) -> Symbol {
        if let Some(existing) = self.entries.read().unwrap().get(s) {
            return Symbol(existing.clone());
        }
        let mut entries = self.entries.write().unwrap();
        // Re-check: another thread may have interned it while we waited for the write lock.
        if let Some(existing) = entries.get(s) {
            return Symbol(existing.clone());
        }
        let arc: Arc<str> = Arc::from(s);
        entries.insert(s.into(), arc.clone());
        Symbol(arc)
    }
}

fn table() -> &'static SymbolTable {
    static TABLE: OnceLock<SymbolTable> = OnceLock::new();
    TABLE.get_or_init(|| SymbolTable { entries: RwLock::new(HashMap::new()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_strings_share_storage() {
        let a = Symbol::intern("GetConfiguration");
        let b = Symbol::intern("GetConfiguration");
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str().as_ptr(), b.as_str().as_ptr()));
    }

    #[test]
    fn distinct_strings_are_not_equal() {
        let a = Symbol::intern("foo");
        let b = Symbol::intern("bar");
        assert_ne!(a, b);
    }
}
