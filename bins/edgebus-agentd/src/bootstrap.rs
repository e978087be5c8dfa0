//! Device identity loaded from `<root>/bootstrap.toml`, or sane localhost
//! defaults when that file is absent (first-run / dev use).

use edgebus_config::ConfigStore;
use edgebus_core::Value;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceFacts {
    pub thing_name: String,
    pub aws_region: String,
    pub gg_root_ca_path: String,
    pub ggc_version: String,
}

impl Default for DeviceFacts {
    fn default() -> Self {
        Self {
            thing_name: "UnnamedThing".to_string(),
            aws_region: "us-east-1".to_string(),
            gg_root_ca_path: "/etc/edgebus/rootCA.pem".to_string(),
            ggc_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn load(root: &Path) -> DeviceFacts {
    let path = root.join("bootstrap.toml");
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(facts) => facts,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed bootstrap.toml, using defaults");
                DeviceFacts::default()
            }
        },
        Err(_) => DeviceFacts::default(),
    }
}

/// Seeds `system/thingName` and friends so `GetSystemConfig` and
/// `{configuration:...}` interpolation see the same facts the executor was
/// constructed with.
pub fn seed_config(store: &ConfigStore, facts: &DeviceFacts) {
    let seed = [
        (["system", "thingName"], facts.thing_name.as_str()),
        (["system", "awsRegion"], facts.aws_region.as_str()),
        (["system", "rootCaPath"], facts.gg_root_ca_path.as_str()),
        (["system", "ggcVersion"], facts.ggc_version.as_str()),
    ];
    for (path, value) in seed {
        let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
        if let Err(e) = store.write(&path, Value::str(value), 0) {
            warn!(?path, error = %e, "failed to seed system config");
        }
    }
}
