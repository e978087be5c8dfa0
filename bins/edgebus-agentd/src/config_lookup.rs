//! Resolves `{configuration:/json/ptr}` recipe tokens (spec §4.G) straight
//! against the in-process `gg_config` store, skipping the core-bus round
//! trip the IPC operations take.

use edgebus_config::ConfigStore;
use edgebus_core::Value;
use edgebus_recipe::ConfigLookup;

pub struct StoreConfigLookup {
    store: ConfigStore,
}

impl StoreConfigLookup {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }
}

impl ConfigLookup for StoreConfigLookup {
    fn lookup(&self, component: &str, json_pointer: &str) -> Option<Value> {
        let mut path = vec!["services".to_string(), component.to_string(), "configuration".to_string()];
        path.extend(json_pointer.split('/').filter(|segment| !segment.is_empty()).map(str::to_string));
        self.store.read(&path).ok()
    }
}
