//! `{type:key}` / `{componentDep:type:key}` variable grammar (spec §4.G),
//! grounded in `ggl_is_recipe_variable`/`ggl_parse_recipe_variable`
//! (`modules/ggl-recipe/src/recipe.c`).

use crate::error::RecipeError;

/// A parsed `{...}` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeVariable {
    pub component_dependency_name: Option<String>,
    pub var_type: String,
    pub key: String,
}

/// Whether `token` has the recipe-variable shape: `{`...`}`, no nested
/// braces, and one or two `:` delimiters.
pub fn is_recipe_variable(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 5 {
        return false;
    }
    if chars[0] != '{' || chars[chars.len() - 1] != '}' {
        return false;
    }
    let mut colons = 0;
    for &c in &chars[1..chars.len() - 1] {
        if c == '{' || c == '}' {
            return false;
        }
        if c == ':' {
            colons += 1;
        }
    }
    (1..=2).contains(&colons)
}

/// Parses a well-formed `{...}` token into its parts. `key` may itself
/// contain `:`-free literal text (a JSON pointer such as `/json/ptr` has no
/// colons, so the naive split-on-`:` from the original carries over
/// unchanged).
pub fn parse_recipe_variable(token: &str) -> Result<RecipeVariable, RecipeError> {
    if !is_recipe_variable(token) {
        return Err(RecipeError::BadToken(token.to_string()));
    }
    let inner = &token[1..token.len() - 1];
    let parts: Vec<&str> = inner.split(':').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(RecipeError::BadToken(token.to_string()));
    }
    match parts.len() {
        2 => Ok(RecipeVariable {
            component_dependency_name: None,
            var_type: parts[0].to_string(),
            key: parts[1].to_string(),
        }),
        3 => Ok(RecipeVariable {
            component_dependency_name: Some(parts[0].to_string()),
            var_type: parts[1].to_string(),
            key: parts[2].to_string(),
        }),
        _ => Err(RecipeError::BadToken(token.to_string())),
    }
}

/// Scans `template` for `{...}` runs and calls `resolve` on each
/// well-formed token, substituting its return value; malformed-looking
/// `{...}` spans (wrong delimiter count, nested braces) are left in the
/// output verbatim as literal text rather than failing the whole string,
/// since free-form scripts may legitimately contain brace characters.
pub fn expand(
    template: &str,
    mut resolve: impl FnMut(&RecipeVariable) -> Result<String, RecipeError>,
) -> Result<String, RecipeError> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '{' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let Some(end) = chars[i..].iter().position(|&c| c == '}').map(|p| i + p) else {
            out.extend(&chars[i..]);
            break;
        };
        let token: String = chars[i..=end].iter().collect();
        if is_recipe_variable(&token) {
            let var = parse_recipe_variable(&token)?;
            out.push_str(&resolve(&var)?);
        } else {
            out.push_str(&token);
        }
        i = end + 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_part_token() {
        let v = parse_recipe_variable("{kernel:rootPath}").unwrap();
        assert_eq!(v.var_type, "kernel");
        assert_eq!(v.key, "rootPath");
        assert!(v.component_dependency_name.is_none());
    }

    #[test]
    fn parses_three_part_componentdep_token() {
        let v = parse_recipe_variable("{Dep:configuration:/json/ptr}").unwrap();
        assert_eq!(v.component_dependency_name.as_deref(), Some("Dep"));
        assert_eq!(v.var_type, "configuration");
        assert_eq!(v.key, "/json/ptr");
    }

    #[test]
    fn rejects_zero_or_too_many_colons() {
        assert!(!is_recipe_variable("{nodelimiter}"));
        assert!(!is_recipe_variable("{a:b:c:d}"));
    }

    #[test]
    fn expand_substitutes_recognized_tokens_and_preserves_literal_braces() {
        let out = expand("path={work:path}/x {not a var}", |v| {
            assert_eq!(v.var_type, "work");
            Ok("/greengrass/work/Comp/".to_string())
        })
        .unwrap();
        assert_eq!(out, "path=/greengrass/work/Comp//x {not a var}");
    }
}
