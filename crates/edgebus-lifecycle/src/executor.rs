//! The lifecycle executor (spec §4.H): owns every component's FSM state,
//! drives phase scripts, and exposes health to the fleet-status publisher.
//! Grounded in `lifecycle_manager.{hpp,cpp}`'s per-component state table
//! plus event dispatch loop, collapsed here into direct async methods since
//! Rust's ownership model makes the manager's mutex-guarded table and
//! callback dispatch unnecessary ceremony.

use crate::component::{self, Dependency, DependencyType};
use crate::dependency_order::compute_ordered_dependencies;
use crate::error::LifecycleError;
use crate::error_rate::{ErrorRate, MIN_RETRY_DELAY};
use crate::fsm::{self, Event, State, UpdateFlags};
use crate::phase_runner::{self, PhaseEnvironment, PhaseOutcome};
use crate::status::ComponentStatus;
use edgebus_core::{CoreError, OrderedMap, Value};
use edgebus_recipe::{
    current_architecture, fetch_phase, select_manifest_and_lifecycle, select_run_phase,
    ConfigLookup, InterpolationContext, Phase,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

struct ComponentEntry {
    version: String,
    recipe: OrderedMap,
    lifecycle: OrderedMap,
    dependencies: Vec<Dependency>,
    state: State,
    error_rates: HashMap<&'static str, ErrorRate>,
}

impl ComponentEntry {
    fn has_install_phase(&self) -> bool {
        self.lifecycle.contains_key("install")
    }

    fn run_phase_name(&self) -> &'static str {
        if self.lifecycle.contains_key("startup") {
            "startup"
        } else {
            "run"
        }
    }
}

/// Facts about the device needed to populate phase environments and
/// `{kernel:...}`/`{iot:...}` interpolation (spec §4.G/§4.H), supplied once
/// at executor construction.
#[derive(Debug, Clone)]
pub struct DeviceFacts {
    pub kernel_root_path: String,
    pub thing_name: String,
    pub aws_region: String,
    pub gg_root_ca_path: String,
    pub ggc_version: String,
}

/// Owns every registered component's FSM state and drives its phases.
pub struct Executor {
    facts: DeviceFacts,
    config: Arc<dyn ConfigLookup>,
    components: RwLock<HashMap<String, ComponentEntry>>,
}

impl Executor {
    pub fn new(facts: DeviceFacts, config: Arc<dyn ConfigLookup>) -> Self {
        Self { facts, config, components: RwLock::new(HashMap::new()) }
    }

    /// Registers a component from its already-decoded recipe tree,
    /// selecting the matching manifest/lifecycle and entering `New` (spec
    /// §4.H: `Initial --init--> New`).
    pub fn register(&self, name: &str, version: &str, recipe: OrderedMap) -> Result<(), LifecycleError> {
        if self.components.read().contains_key(name) {
            return Err(LifecycleError::AlreadyRegistered(name.to_string()));
        }
        let (_manifest, lifecycle) = select_manifest_and_lifecycle(&recipe)
            .map_err(|e| LifecycleError::Other(CoreError::invalid(e.to_string())))?;
        let lifecycle = lifecycle.clone();
        let dependencies = component::parse_dependencies(&recipe)?;

        let entry = ComponentEntry {
            version: version.to_string(),
            recipe,
            lifecycle,
            dependencies,
            state: fsm::apply(State::Initial, Event::Init, false),
            error_rates: HashMap::new(),
        };
        self.components.write().insert(name.to_string(), entry);
        info!(component = name, version, "component registered");
        Ok(())
    }

    pub fn status(&self, name: &str) -> ComponentStatus {
        self.components
            .read()
            .get(name)
            .map(|e| e.state.status())
            .unwrap_or(ComponentStatus::Unknown)
    }

    /// Names of every registered component, in registration order is not
    /// preserved by `HashMap`; callers that need a stable run order should
    /// use [`Executor::dependency_order`].
    pub fn component_names(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    /// Dependency-ordered run list over every registered component (spec
    /// §4.H, scenario 6): components whose dependencies can't all be
    /// resolved (missing or cyclic) come back as `inactive`.
    pub fn dependency_order(&self) -> (Vec<String>, Vec<String>) {
        let components = self.components.read();
        let names: Vec<String> = components.keys().cloned().collect();
        compute_ordered_dependencies(names, |name| {
            components
                .get(name)
                .map(|e| e.dependencies.iter().map(|d| d.name.clone()).collect())
                .unwrap_or_default()
        })
    }

    fn deps_ready(&self, name: &str) -> bool {
        let components = self.components.read();
        let Some(entry) = components.get(name) else { return false };
        entry.dependencies.iter().all(|dep| {
            if dep.dependency_type == DependencyType::Soft && !components.contains_key(&dep.name) {
                return true;
            }
            components
                .get(&dep.name)
                .map(|d| d.state.status() == ComponentStatus::Running)
                .unwrap_or(false)
        })
    }

    fn work_dir(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}/work/{}", self.facts.kernel_root_path, name))
    }

    fn phase_environment(&self, name: &str, svcuid: Option<String>) -> PhaseEnvironment {
        let needs_tes = self.components.read().get(name).is_some_and(|e| {
            e.dependencies.iter().any(|d| d.name == "aws.greengrass.TokenExchangeService")
        });
        PhaseEnvironment {
            svcuid: svcuid.clone(),
            aws_container_authorization_token: svcuid,
            aws_container_credentials_full_uri: needs_tes
                .then(|| "http://localhost:8080/2016-11-01/credentialprovider/".to_string()),
            aws_iot_thing_name: self.facts.thing_name.clone(),
            aws_region: self.facts.aws_region.clone(),
            gg_root_ca_path: self.facts.gg_root_ca_path.clone(),
            ggc_version: self.facts.ggc_version.clone(),
            posix_user: None,
            posix_group: None,
        }
    }

    fn snapshot_phase(&self, name: &str, phase_name: &str) -> Result<(Phase, Option<u64>), LifecycleError> {
        let components = self.components.read();
        let entry = components.get(name).ok_or_else(|| LifecycleError::UnknownComponent(name.to_string()))?;
        let phase = match phase_name {
            "startup" | "run" => select_run_phase(&entry.lifecycle)
                .map_err(|e| LifecycleError::Other(CoreError::invalid(e.to_string())))?
                .map(|(_, p)| p),
            other => fetch_phase(&entry.lifecycle, other)
                .map_err(|e| LifecycleError::Other(CoreError::invalid(e.to_string())))?,
        };
        let phase = phase.ok_or_else(|| LifecycleError::PhaseFailed(format!("{phase_name} phase not defined")))?;
        let default_timeout = edgebus_recipe::default_timeout_seconds(phase_name);
        Ok((phase, default_timeout))
    }

    async fn run_named_phase(&self, name: &str, phase_name: &str, svcuid: Option<String>) -> Result<PhaseOutcome, LifecycleError> {
        let (phase, default_timeout) = self.snapshot_phase(name, phase_name)?;

        if phase_runner::should_skip(&phase) {
            return Ok(PhaseOutcome::Skipped);
        }

        let (version, component_name_owned) = {
            let components = self.components.read();
            let entry = components.get(name).ok_or_else(|| LifecycleError::UnknownComponent(name.to_string()))?;
            (entry.version.clone(), name.to_string())
        };

        let context = InterpolationContext {
            kernel_root_path: &self.facts.kernel_root_path,
            thing_name: &self.facts.thing_name,
            component_name: &component_name_owned,
            component_version: &version,
        };
        let (script, timeout_secs) = phase_runner::expand_phase(&phase, &context, self.config.as_ref(), default_timeout)
            .map_err(LifecycleError::Other)?;

        let work_dir = self.work_dir(name);
        let _ = std::fs::create_dir_all(&work_dir);
        let env = self.phase_environment(name, svcuid);
        let timeout = timeout_secs.map(std::time::Duration::from_secs);

        Ok(phase_runner::run_phase(&script, &work_dir, &env, &phase.set_env, phase.requires_privilege, timeout).await)
    }

    fn record_outcome(&self, name: &str, phase_name: &'static str, outcome: PhaseOutcome) -> bool {
        let mut components = self.components.write();
        let Some(entry) = components.get_mut(name) else { return false };
        match outcome {
            PhaseOutcome::Ok | PhaseOutcome::Skipped => false,
            PhaseOutcome::Err | PhaseOutcome::TimedOut => {
                entry.error_rates.entry(phase_name).or_default().record_failure()
            }
        }
    }

    /// Applies an `update` request, driving the FSM through as many
    /// self-triggered transitions (install -> startup, deps-ready, etc.)
    /// as are immediately available, running phase scripts as each
    /// transition requires one. Returns the component's status once the
    /// walk reaches a state with no further automatic transition (spec
    /// §4.H diagram).
    pub async fn update(&self, name: &str, flags: UpdateFlags, svcuid: Option<String>) -> Result<ComponentStatus, LifecycleError> {
        loop {
            let (state, has_install) = {
                let components = self.components.read();
                let entry = components.get(name).ok_or_else(|| LifecycleError::UnknownComponent(name.to_string()))?;
                (entry.state, entry.has_install_phase())
            };

            match state {
                State::New if flags.start || flags.restart || flags.reinstall => {
                    self.transition(name, Event::Update(flags), has_install);
                }
                State::Installing => {
                    let outcome = self.run_named_phase(name, "install", svcuid.clone()).await?;
                    let broken = self.record_outcome(name, "install", outcome);
                    if matches!(outcome, PhaseOutcome::Err | PhaseOutcome::TimedOut) && !broken {
                        tokio::time::sleep(MIN_RETRY_DELAY).await;
                    }
                    self.transition(name, Event::ScriptErr { broken }.or_ok(outcome), has_install);
                }
                State::Installed if self.deps_ready(name) => {
                    self.transition(name, Event::DepsReady, has_install);
                }
                State::Startup => {
                    let phase_name = {
                        let components = self.components.read();
                        components.get(name).unwrap().run_phase_name()
                    };
                    let outcome = self.run_named_phase(name, phase_name, svcuid.clone()).await?;
                    let broken = self.record_outcome(name, phase_name, outcome);
                    if matches!(outcome, PhaseOutcome::Err | PhaseOutcome::TimedOut) && !broken {
                        tokio::time::sleep(MIN_RETRY_DELAY).await;
                    }
                    self.transition(name, Event::ScriptErr { broken }.or_ok(outcome), has_install);
                }
                State::Running if flags.stop => {
                    self.transition(name, Event::Update(flags), has_install);
                }
                State::Stopping => {
                    let outcome = self.run_named_phase(name, "shutdown", svcuid.clone()).await?;
                    let broken = self.record_outcome(name, "shutdown", outcome);
                    self.transition(name, Event::ScriptErr { broken }.or_ok(outcome), has_install);
                }
                State::Finished if flags.restart || flags.reinstall => {
                    self.transition(name, Event::Update(flags), has_install);
                }
                _ => break,
            }
        }
        Ok(self.status(name))
    }

    fn transition(&self, name: &str, event: Event, has_install: bool) {
        let mut components = self.components.write();
        if let Some(entry) = components.get_mut(name) {
            let before = entry.state;
            entry.state = fsm::apply(before, event, has_install);
            if entry.state != before {
                info!(component = name, from = %before.status(), to = %entry.state.status(), "lifecycle transition");
            }
        }
    }
}

impl Event {
    /// `ScriptErr{broken}` if the phase outcome was a failure, else
    /// `ScriptOk`.
    fn or_ok(self, outcome: PhaseOutcome) -> Event {
        match outcome {
            PhaseOutcome::Ok | PhaseOutcome::Skipped => Event::ScriptOk,
            PhaseOutcome::Err | PhaseOutcome::TimedOut => self,
        }
    }
}

impl edgebus_ipc::ComponentRegistry for Executor {
    fn is_registered(&self, component_name: &str) -> bool {
        self.components.read().contains_key(component_name)
    }
}

pub fn current_platform_architecture() -> &'static str {
    current_architecture()
}
