//! Ops CLI: resolve a recipe's manifest/lifecycle for the current platform
//! and, optionally, run one of its phases standalone (spec §4.G/§4.H),
//! without bringing up the rest of the agent.

use edgebus_core::{json, CoreError, OrderedMap, Value};
use edgebus_lifecycle::phase_runner::{expand_phase, run_phase, should_skip, PhaseEnvironment, PhaseOutcome};
use edgebus_recipe::{current_architecture, select_manifest_and_lifecycle, ConfigLookup, InterpolationContext};
use std::path::PathBuf;
use tracing::info;

/// No live `gg_config` store is attached to this CLI; `{configuration:...}`
/// tokens always fail to resolve, matching a component with no config set.
struct NullConfigLookup;

impl ConfigLookup for NullConfigLookup {
    fn lookup(&self, _component: &str, _json_pointer: &str) -> Option<Value> {
        None
    }
}

struct Args {
    recipe_path: PathBuf,
    phase_name: Option<String>,
    work_dir: PathBuf,
    kernel_root_path: String,
    thing_name: String,
}

fn usage() -> ! {
    eprintln!(
        "usage: edgebus-recipe-runner <recipe.json> [phase] [--work-dir DIR] [--kernel-root PATH] [--thing-name NAME]"
    );
    std::process::exit(2);
}

fn parse_args() -> Args {
    let mut positionals = Vec::new();
    let mut work_dir = None;
    let mut kernel_root_path = "/var/lib/edgebus".to_string();
    let mut thing_name = "UnnamedThing".to_string();

    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--work-dir" => work_dir = Some(PathBuf::from(raw.next().unwrap_or_else(|| usage()))),
            "--kernel-root" => kernel_root_path = raw.next().unwrap_or_else(|| usage()),
            "--thing-name" => thing_name = raw.next().unwrap_or_else(|| usage()),
            _ => positionals.push(arg),
        }
    }

    if positionals.is_empty() {
        usage();
    }
    let recipe_path = PathBuf::from(positionals.remove(0));
    let phase_name = positionals.pop();

    Args {
        work_dir: work_dir.unwrap_or_else(|| std::env::temp_dir().join("edgebus-recipe-runner")),
        recipe_path,
        phase_name,
        kernel_root_path,
        thing_name,
    }
}

fn load_recipe(path: &std::path::Path) -> Result<OrderedMap, CoreError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CoreError::failure(format!("reading {}: {e}", path.display())).with_source(e))?;
    let decoded: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| CoreError::parse(format!("parsing {}: {e}", path.display())).with_source(e))?;
    match json::from_json(decoded) {
        Value::Map(map) => Ok(map),
        _ => Err(CoreError::invalid("recipe document is not a JSON object")),
    }
}

fn string_field<'a>(recipe: &'a OrderedMap, key: &str) -> Result<&'a str, CoreError> {
    recipe
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::invalid(format!("recipe is missing {key}")))
}

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args();
    let recipe = load_recipe(&args.recipe_path)?;
    let component_name = string_field(&recipe, "ComponentName")?.to_string();
    let component_version = string_field(&recipe, "ComponentVersion")?.to_string();

    let (manifest, lifecycle) = select_manifest_and_lifecycle(&recipe)
        .map_err(|e| CoreError::invalid(format!("resolving manifest/lifecycle: {e}")))?;

    println!("component:     {component_name} {component_version}");
    println!("architecture:  {}", current_architecture());
    println!(
        "manifest:      {}",
        manifest.get("Platform").map(|_| "matched").unwrap_or("matched (no Platform echoed)")
    );
    println!("lifecycle phases present:");
    for phase_name in ["install", "startup", "run", "shutdown", "recover"] {
        let present = lifecycle.get(phase_name).is_some();
        println!("  {phase_name:<8} {}", if present { "yes" } else { "no" });
    }

    let Some(phase_name) = args.phase_name else {
        return Ok(());
    };

    let phase = edgebus_recipe::fetch_phase(lifecycle, &phase_name)
        .map_err(|e| CoreError::invalid(format!("parsing {phase_name} phase: {e}")))?
        .ok_or_else(|| CoreError::no_entry(format!("recipe has no {phase_name} phase")))?;

    if should_skip(&phase) {
        info!(phase = %phase_name, "SkipIf matched; not running");
        return Ok(());
    }

    let context = InterpolationContext {
        kernel_root_path: &args.kernel_root_path,
        thing_name: &args.thing_name,
        component_name: &component_name,
        component_version: &component_version,
    };
    let default_timeout = edgebus_recipe::default_timeout_seconds(&phase_name);
    let (script, timeout_seconds) = expand_phase(&phase, &context, &NullConfigLookup, default_timeout)
        .map_err(|e| CoreError::invalid(format!("expanding {phase_name} phase: {e}")))?;

    std::fs::create_dir_all(&args.work_dir)
        .map_err(|e| CoreError::failure(format!("creating {}: {e}", args.work_dir.display())).with_source(e))?;

    let env = PhaseEnvironment {
        aws_iot_thing_name: args.thing_name.clone(),
        aws_region: "us-east-1".to_string(),
        gg_root_ca_path: String::new(),
        ggc_version: env!("CARGO_PKG_VERSION").to_string(),
        ..Default::default()
    };
    let timeout = timeout_seconds.map(std::time::Duration::from_secs);

    info!(phase = %phase_name, work_dir = %args.work_dir.display(), "running phase");
    let outcome = run_phase(&script, &args.work_dir, &env, &phase.set_env, phase.requires_privilege, timeout).await;
    println!("outcome: {outcome:?}");

    match outcome {
        PhaseOutcome::Ok | PhaseOutcome::Skipped => Ok(()),
        PhaseOutcome::Err => Err(CoreError::failure(format!("{phase_name} phase exited non-zero"))),
        PhaseOutcome::TimedOut => Err(CoreError::failure(format!("{phase_name} phase timed out"))),
    }
}
