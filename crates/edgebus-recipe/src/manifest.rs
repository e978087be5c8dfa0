//! Platform manifest and lifecycle selection (spec §4.G), grounded in
//! `modules/ggl-recipe/src/recipe.c`'s `manifest_selection`/
//! `select_linux_lifecycle`/`select_linux_manifest`.

use crate::error::RecipeError;
use edgebus_core::{OrderedMap, Value};

/// Compile-time architecture string, matching the original's
/// `get_current_architecture` `#if defined(...)` ladder.
pub fn current_architecture() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "amd64"
    } else if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "aarch64"
    } else if cfg!(target_arch = "arm") {
        "arm"
    } else {
        ""
    }
}

fn as_str_field<'v>(map: &'v OrderedMap, key: &str) -> Option<&'v str> {
    map.get(key).and_then(Value::as_str)
}

/// Whether `manifest`'s `Platform` block matches this runtime, per spec:
/// `os` in `{"linux","*","all","",missing}` and `architecture` in
/// `{current,"*","all",missing}`.
///
/// Returns `Err` if `Platform` is absent or malformed (the original treats
/// a missing/invalid `Platform` block as a hard failure of the whole
/// selection, not merely a non-match).
fn platform_matches(manifest: &OrderedMap) -> Result<bool, RecipeError> {
    let platform = manifest
        .get("Platform")
        .ok_or_else(|| RecipeError::Invalid("Platform not provided".into()))?
        .as_map()
        .ok_or_else(|| RecipeError::Invalid("Platform must be a map".into()))?;

    let Some(os) = as_str_field(platform, "os") else {
        // "If OS is not provided then do nothing": no match, no error.
        return Ok(false);
    };

    if !matches!(os, "linux" | "*" | "all") {
        return Ok(false);
    }

    match platform.get("architecture") {
        None => Ok(true),
        Some(arch) => {
            let arch = arch
                .as_str()
                .ok_or_else(|| RecipeError::Invalid("Platform architecture must be a string".into()))?;
            Ok(arch.is_empty() || arch == "*" || arch == "all" || arch == current_architecture())
        }
    }
}

/// Looks up `recipe.Lifecycle[selection]` for the first `selection` entry
/// equal to `"all"` or `"linux"` that resolves to a non-empty map.
fn lifecycle_selection<'r>(
    selections: &[&str],
    recipe: &'r OrderedMap,
) -> Result<Option<&'r OrderedMap>, RecipeError> {
    let Some(global_lifecycle) = recipe.get("Lifecycle") else {
        return Ok(None);
    };
    let global_lifecycle = global_lifecycle
        .as_map()
        .ok_or_else(|| RecipeError::Invalid("top-level Lifecycle must be a map".into()))?;

    for &selection in selections {
        if selection != "all" && selection != "linux" {
            continue;
        }
        if let Some(candidate) = global_lifecycle.get(selection) {
            let candidate = candidate
                .as_map()
                .ok_or_else(|| RecipeError::Invalid("invalid global linux lifecycle".into()))?;
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Picks the `Lifecycle` map out of one manifest entry once its `Platform`
/// has already matched: the manifest's own non-empty `Lifecycle`, else
/// `Selections` resolved against the top-level `Lifecycle`, else the
/// default selection `["all"]`.
fn select_from_manifest<'r>(
    manifest: &'r OrderedMap,
    recipe: &'r OrderedMap,
) -> Result<Option<&'r OrderedMap>, RecipeError> {
    if let Some(lifecycle) = manifest.get("Lifecycle") {
        let lifecycle = lifecycle
            .as_map()
            .ok_or_else(|| RecipeError::Invalid("Lifecycle object is not a map".into()))?;
        if !lifecycle.is_empty() {
            return Ok(Some(lifecycle));
        }
    }

    if let Some(selections) = manifest.get("Selections") {
        let selections = selections
            .as_list()
            .ok_or_else(|| RecipeError::Invalid("Selections must be a list".into()))?;
        if !selections.is_empty() {
            let names: Vec<&str> = selections.iter().filter_map(Value::as_str).collect();
            return lifecycle_selection(&names, recipe);
        }
    }

    lifecycle_selection(&["all"], recipe)
}

/// Returns `(manifest, lifecycle)` for the first matching manifest entry,
/// mirroring `select_linux_manifest` + `select_linux_lifecycle` run
/// together (they always pick the same entry).
pub fn select_manifest_and_lifecycle<'r>(
    recipe: &'r OrderedMap,
) -> Result<(&'r OrderedMap, &'r OrderedMap), RecipeError> {
    let manifests = recipe
        .get("Manifests")
        .ok_or_else(|| RecipeError::Invalid("no Manifest found in the recipe".into()))?
        .as_list()
        .ok_or_else(|| RecipeError::Invalid("Manifests must be a list".into()))?;

    for entry in manifests {
        let manifest = entry
            .as_map()
            .ok_or_else(|| RecipeError::Invalid("manifest entry must be a map".into()))?;

        if !platform_matches(manifest)? {
            continue;
        }

        if let Some(lifecycle) = select_from_manifest(manifest, recipe)? {
            return Ok((manifest, lifecycle));
        }
    }

    Err(RecipeError::NoLifecycleSelected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(os: &str, arch: Option<&str>) -> Value {
        let mut m = OrderedMap::new();
        m.insert("os", Value::str(os));
        if let Some(a) = arch {
            m.insert("architecture", Value::str(a));
        }
        Value::Map(m)
    }

    fn lifecycle_with_install() -> Value {
        let mut m = OrderedMap::new();
        m.insert("install", Value::str("echo installing"));
        Value::Map(m)
    }

    fn recipe_with_one_manifest() -> OrderedMap {
        let mut manifest = OrderedMap::new();
        manifest.insert("Platform", platform("linux", Some("*")));
        manifest.insert("Lifecycle", lifecycle_with_install());

        let mut recipe = OrderedMap::new();
        recipe.insert("Manifests", Value::List(vec![Value::Map(manifest)]));
        recipe
    }

    #[test]
    fn selects_first_matching_manifest_with_inline_lifecycle() {
        let recipe = recipe_with_one_manifest();
        let (_, lifecycle) = select_manifest_and_lifecycle(&recipe).unwrap();
        assert!(lifecycle.get("install").is_some());
    }

    #[test]
    fn falls_back_to_top_level_lifecycle_via_selections() {
        let mut manifest = OrderedMap::new();
        manifest.insert("Platform", platform("all", None));
        manifest.insert(
            "Selections",
            Value::List(vec![Value::str("linux")]),
        );

        let mut recipe = OrderedMap::new();
        recipe.insert("Manifests", Value::List(vec![Value::Map(manifest)]));

        let mut global_lifecycle = OrderedMap::new();
        global_lifecycle.insert("linux", lifecycle_with_install());
        recipe.insert("Lifecycle", Value::Map(global_lifecycle));

        let (_, lifecycle) = select_manifest_and_lifecycle(&recipe).unwrap();
        assert!(lifecycle.get("install").is_some());
    }

    #[test]
    fn non_matching_architecture_is_skipped_not_errored() {
        let mut manifest = OrderedMap::new();
        manifest.insert("Platform", platform("linux", Some("mips")));
        manifest.insert("Lifecycle", lifecycle_with_install());

        let mut recipe = OrderedMap::new();
        recipe.insert("Manifests", Value::List(vec![Value::Map(manifest)]));

        let err = select_manifest_and_lifecycle(&recipe).unwrap_err();
        assert!(matches!(err, RecipeError::NoLifecycleSelected));
    }

    #[test]
    fn missing_platform_block_is_an_error() {
        let mut manifest = OrderedMap::new();
        manifest.insert("Lifecycle", lifecycle_with_install());

        let mut recipe = OrderedMap::new();
        recipe.insert("Manifests", Value::List(vec![Value::Map(manifest)]));

        let err = select_manifest_and_lifecycle(&recipe).unwrap_err();
        assert!(matches!(err, RecipeError::Invalid(_)));
    }
}
