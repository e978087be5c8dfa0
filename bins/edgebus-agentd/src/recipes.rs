//! Loads every `*.json` recipe (spec §3 "A recipe is a map with
//! `ComponentName`, `ComponentVersion`, ...") out of a directory at
//! startup, skipping anything malformed with a logged warning rather than
//! failing the whole daemon.

use edgebus_core::{json, OrderedMap, Value};
use std::path::Path;
use tracing::warn;

/// Returns `(componentName, componentVersion, recipe)` for every recipe
/// file that parses and declares both required fields.
pub fn load_all(recipes_dir: &Path) -> Vec<(String, String, OrderedMap)> {
    let entries = match std::fs::read_dir(recipes_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut recipes = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match load_one(&path) {
            Ok(recipe) => recipes.push(recipe),
            Err(reason) => warn!(path = %path.display(), %reason, "skipping unparsable recipe"),
        }
    }
    recipes
}

fn load_one(path: &Path) -> Result<(String, String, OrderedMap), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let json: serde_json::Value = serde_json::from_str(&contents).map_err(|e| e.to_string())?;
    let Value::Map(recipe) = json::from_json(json) else {
        return Err("recipe document is not a JSON object".to_string());
    };

    let name = recipe.get("ComponentName").and_then(Value::as_str).ok_or("missing ComponentName")?.to_string();
    let version = recipe.get("ComponentVersion").and_then(Value::as_str).ok_or("missing ComponentVersion")?.to_string();
    Ok((name, version, recipe))
}
