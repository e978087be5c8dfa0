//! Resolves a parsed [`RecipeVariable`](crate::variable::RecipeVariable)
//! into its expansion string (spec §4.G variable table).

use crate::error::RecipeError;
use crate::variable::RecipeVariable;
use edgebus_core::Value;

/// Looks up a component's configuration tree at a JSON pointer, for the
/// `{configuration:/json/ptr}` grammar. Implemented by whichever crate
/// holds the live config store (kept out of this crate to avoid a
/// dependency cycle); tests use an in-memory stub.
pub trait ConfigLookup {
    fn lookup(&self, component: &str, json_pointer: &str) -> Option<Value>;
}

/// Per-component facts needed to expand `kernel`/`iot`/`work`/`artifacts`
/// tokens, independent of any live config store.
pub struct InterpolationContext<'a> {
    pub kernel_root_path: &'a str,
    pub thing_name: &'a str,
    pub component_name: &'a str,
    pub component_version: &'a str,
}

impl InterpolationContext<'_> {
    fn work_path(&self) -> String {
        format!("{}/work/{}/", self.kernel_root_path, self.component_name)
    }

    fn artifacts_path(&self) -> String {
        format!(
            "{}/packages/artifacts/{}/{}/",
            self.kernel_root_path, self.component_name, self.component_version
        )
    }

    fn artifacts_decompressed_path(&self) -> String {
        format!(
            "{}/packages/artifacts-unarchived/{}/{}/",
            self.kernel_root_path, self.component_name, self.component_version
        )
    }

    /// Expands one parsed token against this context and `config`.
    pub fn resolve(
        &self,
        var: &RecipeVariable,
        config: &dyn ConfigLookup,
    ) -> Result<String, RecipeError> {
        match (var.var_type.as_str(), var.key.as_str()) {
            ("kernel", "rootPath") => Ok(self.kernel_root_path.to_string()),
            ("iot", "thingName") => Ok(self.thing_name.to_string()),
            ("work", "path") => Ok(self.work_path()),
            ("artifacts", "path") => Ok(self.artifacts_path()),
            ("artifacts", "decompressedPath") => Ok(self.artifacts_decompressed_path()),
            ("configuration", pointer) => {
                let component = var
                    .component_dependency_name
                    .as_deref()
                    .unwrap_or(self.component_name);
                let value = config
                    .lookup(component, pointer)
                    .ok_or_else(|| RecipeError::ConfigLookupFailed(pointer.to_string()))?;
                Ok(value_to_string(&value))
            }
            _ => Err(RecipeError::UnknownVariable(format!(
                "{}:{}",
                var.var_type, var.key
            ))),
        }
    }
}

/// A buffer expands to its raw text; anything else is JSON-encoded, per
/// spec §4.G ("Config value ..., JSON-encoded if not a buffer").
fn value_to_string(value: &Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => serde_json::to_string(&edgebus_core::json::to_json(value))
            .unwrap_or_else(|_| String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubConfig;
    impl ConfigLookup for StubConfig {
        fn lookup(&self, component: &str, json_pointer: &str) -> Option<Value> {
            if component == "self" && json_pointer == "/enabled" {
                Some(Value::Bool(true))
            } else {
                None
            }
        }
    }

    fn ctx() -> InterpolationContext<'static> {
        InterpolationContext {
            kernel_root_path: "/greengrass/v2",
            thing_name: "MyThing",
            component_name: "self",
            component_version: "1.0.0",
        }
    }

    #[test]
    fn resolves_work_and_artifacts_paths() {
        use crate::variable::parse_recipe_variable;
        let config = StubConfig;
        let context = ctx();

        let work = parse_recipe_variable("{work:path}").unwrap();
        assert_eq!(
            context.resolve(&work, &config).unwrap(),
            "/greengrass/v2/work/self/"
        );

        let artifacts = parse_recipe_variable("{artifacts:path}").unwrap();
        assert_eq!(
            context.resolve(&artifacts, &config).unwrap(),
            "/greengrass/v2/packages/artifacts/self/1.0.0/"
        );
    }

    #[test]
    fn configuration_token_json_encodes_non_buffer_values() {
        use crate::variable::parse_recipe_variable;
        let config = StubConfig;
        let context = ctx();
        let var = parse_recipe_variable("{configuration:/enabled}").unwrap();
        assert_eq!(context.resolve(&var, &config).unwrap(), "true");
    }

    #[test]
    fn unknown_variable_type_is_an_error() {
        use crate::variable::parse_recipe_variable;
        let config = StubConfig;
        let context = ctx();
        let var = parse_recipe_variable("{bogus:thing}").unwrap();
        assert!(context.resolve(&var, &config).is_err());
    }
}
