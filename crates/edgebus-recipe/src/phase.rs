//! Lifecycle phase section parsing (spec §4.G), grounded in
//! `fetch_script_section`/`process_script_section_as_map` and
//! `parse_requiresprivilege_section` (`modules/ggl-recipe/src/recipe.c`).

use crate::error::RecipeError;
use edgebus_core::{OrderedMap, Value};

/// Default phase timeout when none is specified: 120 s for every phase
/// except `run`, which has no timeout (spec §4.G).
pub fn default_timeout_seconds(phase_name: &str) -> Option<u64> {
    if phase_name == "run" {
        None
    } else {
        Some(120)
    }
}

/// `SkipIf <condition>`: `onpath <exec>` skips the phase if `exec` is on
/// `PATH`; `exists <file>` skips if `file` exists. Anything else never
/// skips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipIf {
    OnPath(String),
    Exists(String),
    Never,
}

fn parse_skip_if(raw: &str) -> SkipIf {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("onpath ") {
        SkipIf::OnPath(rest.trim().to_string())
    } else if let Some(rest) = raw.strip_prefix("exists ") {
        SkipIf::Exists(rest.trim().to_string())
    } else {
        SkipIf::Never
    }
}

/// A resolved lifecycle phase, still holding `script`/`timeout_raw` as
/// unexpanded templates: the caller runs [`crate::variable::expand`] over
/// them before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub script: String,
    pub set_env: Vec<(String, String)>,
    pub requires_privilege: bool,
    /// Raw `Timeout` value: either a decimal literal or an unexpanded
    /// `{type:key}` token (the original permits either before expansion).
    pub timeout_raw: Option<String>,
    pub skip_if: SkipIf,
}

fn is_positive_integer(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn parse_set_env(map: &OrderedMap) -> Result<Vec<(String, String)>, RecipeError> {
    let mut out = Vec::with_capacity(map.len());
    for (k, v) in map.iter() {
        let value = v
            .as_str()
            .ok_or_else(|| RecipeError::Invalid(format!("Setenv.{k} must be a string")))?;
        out.push((k.to_string(), value.to_string()));
    }
    Ok(out)
}

fn parse_script_map(section: &OrderedMap) -> Result<Phase, RecipeError> {
    let requires_privilege = match section.get("RequiresPrivilege") {
        None => false,
        Some(v) => match v.as_str() {
            Some("true") => true,
            Some("false") => false,
            _ => {
                return Err(RecipeError::Invalid(
                    "RequiresPrivilege needs to be a (true/false) value".into(),
                ))
            }
        },
    };

    let script = section
        .get("Script")
        .and_then(Value::as_str)
        .ok_or_else(|| RecipeError::Invalid("Script section needs to be a string".into()))?
        .to_string();

    let set_env = match section.get("Setenv") {
        None => Vec::new(),
        Some(v) => parse_set_env(
            v.as_map()
                .ok_or_else(|| RecipeError::Invalid("Setenv needs to be a map".into()))?,
        )?,
    };

    let timeout_raw = match section.get("Timeout") {
        None => None,
        Some(v) => {
            let raw = v
                .as_str()
                .ok_or_else(|| {
                    RecipeError::Invalid("Timeout must expand to a positive integer value".into())
                })?;
            if !crate::variable::is_recipe_variable(raw) && !is_positive_integer(raw) {
                return Err(RecipeError::Invalid(
                    "Timeout must expand to a positive integer value".into(),
                ));
            }
            Some(raw.to_string())
        }
    };

    let skip_if = match section.get("SkipIf").and_then(Value::as_str) {
        Some(raw) => parse_skip_if(raw),
        None => SkipIf::Never,
    };

    Ok(Phase { script, set_env, requires_privilege, timeout_raw, skip_if })
}

/// Fetches `lifecycle[phase_name]`. Returns `Ok(None)` if the phase is
/// absent (not every component defines every phase); a phase value that is
/// present but malformed is an error.
pub fn fetch_phase(lifecycle: &OrderedMap, phase_name: &str) -> Result<Option<Phase>, RecipeError> {
    let Some(section) = lifecycle.get(phase_name) else {
        return Ok(None);
    };

    match section {
        Value::Buffer(_) => {
            let script = section.as_str().expect("Buffer is always valid UTF-8 here").to_string();
            Ok(Some(Phase {
                script,
                set_env: Vec::new(),
                requires_privilege: false,
                timeout_raw: None,
                skip_if: SkipIf::Never,
            }))
        }
        Value::Map(map) => Ok(Some(parse_script_map(map)?)),
        _ => Err(RecipeError::Invalid(format!("{phase_name} section is of invalid type"))),
    }
}

/// `startup` and `run` are mutually exclusive with `startup` preferred;
/// returns the chosen phase's name (`"startup"` or `"run"`) together with
/// its parsed [`Phase`], if either is present.
pub fn select_run_phase(lifecycle: &OrderedMap) -> Result<Option<(&'static str, Phase)>, RecipeError> {
    if let Some(phase) = fetch_phase(lifecycle, "startup")? {
        return Ok(Some(("startup", phase)));
    }
    if let Some(phase) = fetch_phase(lifecycle, "run")? {
        return Ok(Some(("run", phase)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_phase_has_defaults() {
        let mut lifecycle = OrderedMap::new();
        lifecycle.insert("install", Value::str("echo hi"));
        let phase = fetch_phase(&lifecycle, "install").unwrap().unwrap();
        assert_eq!(phase.script, "echo hi");
        assert!(!phase.requires_privilege);
        assert_eq!(phase.timeout_raw, None);
    }

    #[test]
    fn object_phase_parses_all_fields() {
        let mut section = OrderedMap::new();
        section.insert("Script", Value::str("echo starting"));
        section.insert("RequiresPrivilege", Value::str("true"));
        section.insert("Timeout", Value::str("30"));
        let mut setenv = OrderedMap::new();
        setenv.insert("FOO", Value::str("bar"));
        section.insert("Setenv", Value::Map(setenv));
        section.insert("SkipIf", Value::str("onpath docker"));

        let mut lifecycle = OrderedMap::new();
        lifecycle.insert("startup", Value::Map(section));

        let phase = fetch_phase(&lifecycle, "startup").unwrap().unwrap();
        assert!(phase.requires_privilege);
        assert_eq!(phase.timeout_raw.as_deref(), Some("30"));
        assert_eq!(phase.set_env, vec![("FOO".to_string(), "bar".to_string())]);
        assert_eq!(phase.skip_if, SkipIf::OnPath("docker".to_string()));
    }

    #[test]
    fn startup_preferred_over_run() {
        let mut lifecycle = OrderedMap::new();
        lifecycle.insert("run", Value::str("run script"));
        lifecycle.insert("startup", Value::str("startup script"));
        let (name, phase) = select_run_phase(&lifecycle).unwrap().unwrap();
        assert_eq!(name, "startup");
        assert_eq!(phase.script, "startup script");
    }

    #[test]
    fn run_has_no_default_timeout_others_default_to_120() {
        assert_eq!(default_timeout_seconds("run"), None);
        assert_eq!(default_timeout_seconds("install"), Some(120));
        assert_eq!(default_timeout_seconds("startup"), Some(120));
    }

    #[test]
    fn invalid_requires_privilege_value_is_rejected() {
        let mut section = OrderedMap::new();
        section.insert("Script", Value::str("echo hi"));
        section.insert("RequiresPrivilege", Value::str("maybe"));
        let mut lifecycle = OrderedMap::new();
        lifecycle.insert("install", Value::Map(section));
        assert!(fetch_phase(&lifecycle, "install").is_err());
    }
}
