//! Spawns a lifecycle phase's shell script as a child process (spec
//! §4.G/§4.H), grounded in `scriptRunner` (`nucleus/src/lifecycle/
//! scripting.{hpp,cpp}`): working directory `work/<name>/`, an augmented
//! environment, an optional deprivileged user, and a phase timeout with a
//! graceful-stop-then-kill escalation.

use edgebus_core::CoreError;
use edgebus_recipe::{ConfigLookup, InterpolationContext, Phase, SkipIf};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Extra grace period after a timed-out phase is asked to stop before it
/// is force-killed (spec §4.H: "after additional 5 s, force kill").
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Environment and identity facts a running phase needs beyond the
/// recipe's own `Setenv` (spec §4.H bullet list).
#[derive(Debug, Clone, Default)]
pub struct PhaseEnvironment {
    pub svcuid: Option<String>,
    pub aws_container_authorization_token: Option<String>,
    pub aws_container_credentials_full_uri: Option<String>,
    pub aws_iot_thing_name: String,
    pub aws_region: String,
    pub gg_root_ca_path: String,
    pub ggc_version: String,
    pub posix_user: Option<String>,
    pub posix_group: Option<String>,
}

/// Outcome of running one phase script to completion (or to a timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Ok,
    Err,
    Skipped,
    TimedOut,
}

fn executable_on_path(exe: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(exe).is_file())
}

/// Whether `phase.skip_if` says to skip execution entirely.
pub fn should_skip(phase: &Phase) -> bool {
    match &phase.skip_if {
        SkipIf::Never => false,
        SkipIf::OnPath(exe) => executable_on_path(exe),
        SkipIf::Exists(path) => Path::new(path).exists(),
    }
}

/// Expands `phase.script` and `phase.timeout_raw` against `context` and
/// `config`, returning the expanded script and resolved timeout (falling
/// back to `default_timeout`, which is `None` for `run`/no-timeout
/// phases per spec §4.G).
pub fn expand_phase(
    phase: &Phase,
    context: &InterpolationContext<'_>,
    config: &dyn ConfigLookup,
    default_timeout: Option<u64>,
) -> Result<(String, Option<u64>), CoreError> {
    let script = edgebus_recipe::expand(&phase.script, |var| context.resolve(var, config))
        .map_err(|e| CoreError::invalid(format!("expanding phase script: {e}")))?;

    let timeout = match &phase.timeout_raw {
        None => default_timeout,
        Some(raw) => {
            let expanded = edgebus_recipe::expand(raw, |var| context.resolve(var, config))
                .map_err(|e| CoreError::invalid(format!("expanding phase timeout: {e}")))?;
            let seconds: u64 = expanded
                .trim()
                .parse()
                .map_err(|_| CoreError::invalid(format!("phase timeout did not expand to an integer: {expanded}")))?;
            Some(seconds)
        }
    };

    Ok((script, timeout))
}

fn apply_set_env(command: &mut Command, global: &[(String, String)], phase: &[(String, String)]) {
    for (k, v) in global {
        command.env(k, v);
    }
    // phase-specific wins over global (spec §4.H: "global then
    // phase-specific; phase wins").
    for (k, v) in phase {
        command.env(k, v);
    }
}

fn apply_identity(command: &mut Command, env: &PhaseEnvironment, requires_privilege: bool) {
    if requires_privilege {
        return;
    }
    #[cfg(unix)]
    if let Some(user) = &env.posix_user {
        if let Some(uid) = resolve_uid(user) {
            std::os::unix::process::CommandExt::uid(command, uid);
        } else {
            warn!(user, "could not resolve posix user for deprivileged phase execution");
        }
    }
    let _ = env.posix_group.as_ref();
}

#[cfg(unix)]
fn resolve_uid(user: &str) -> Option<u32> {
    // Resolving a username to a uid is a libc/nsswitch concern; a numeric
    // uid is accepted directly, matching `runWithDefault.posixUser`'s
    // common `"uid:gid"`/`"uid"` shapes when nsswitch is unavailable in a
    // constrained image.
    user.split(':').next()?.parse().ok()
}

/// Runs one expanded phase script to completion, honoring `timeout` with
/// a graceful-stop-then-kill escalation once it elapses.
pub async fn run_phase(
    script: &str,
    work_dir: &Path,
    env: &PhaseEnvironment,
    set_env: &[(String, String)],
    requires_privilege: bool,
    timeout: Option<Duration>,
) -> PhaseOutcome {
    let mut command = Command::new("/bin/sh");
    command
        .arg("-c")
        .arg(script)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    if let Some(svcuid) = &env.svcuid {
        command.env("SVCUID", svcuid);
        command.env("AWS_CONTAINER_AUTHORIZATION_TOKEN", env.aws_container_authorization_token.as_deref().unwrap_or(svcuid));
    }
    if let Some(uri) = &env.aws_container_credentials_full_uri {
        command.env("AWS_CONTAINER_CREDENTIALS_FULL_URI", uri);
    }
    command.env("AWS_IOT_THING_NAME", &env.aws_iot_thing_name);
    command.env("AWS_REGION", &env.aws_region);
    command.env("AWS_DEFAULT_REGION", &env.aws_region);
    command.env("GG_ROOT_CA_PATH", &env.gg_root_ca_path);
    command.env("GGC_VERSION", &env.ggc_version);

    apply_set_env(&mut command, &[], set_env);
    apply_identity(&mut command, env, requires_privilege);

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to spawn phase script");
            return PhaseOutcome::Err;
        }
    };

    let wait_result = match timeout {
        None => child.wait().await,
        Some(duration) => match tokio::time::timeout(duration, child.wait()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?duration, "phase script timed out; sending graceful stop");
                terminate_gracefully(&mut child);
                let grace = tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await;
                if grace.is_err() {
                    warn!("phase script did not exit after grace period; force killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                return PhaseOutcome::TimedOut;
            }
        },
    };

    match wait_result {
        Ok(status) if status.success() => PhaseOutcome::Ok,
        Ok(_) => PhaseOutcome::Err,
        Err(e) => {
            debug!(error = %e, "error waiting on phase script");
            PhaseOutcome::Err
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(child: &mut tokio::process::Child) {
    if let Some(pid) = child.id() {
        // SAFETY: `pid` is this child's own pid as reported by the kernel
        // via `tokio::process::Child::id`, valid for the duration of this
        // call.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_script_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_phase(
            "exit 0",
            dir.path(),
            &PhaseEnvironment::default(),
            &[],
            false,
            Some(Duration::from_secs(5)),
        )
        .await;
        assert_eq!(outcome, PhaseOutcome::Ok);
    }

    #[tokio::test]
    async fn failing_script_reports_err() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_phase(
            "exit 7",
            dir.path(),
            &PhaseEnvironment::default(),
            &[],
            false,
            Some(Duration::from_secs(5)),
        )
        .await;
        assert_eq!(outcome, PhaseOutcome::Err);
    }

    #[tokio::test]
    async fn script_exceeding_timeout_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_phase(
            "sleep 30",
            dir.path(),
            &PhaseEnvironment::default(),
            &[],
            false,
            Some(Duration::from_millis(50)),
        )
        .await;
        assert_eq!(outcome, PhaseOutcome::TimedOut);
    }

    #[test]
    fn onpath_skip_detects_common_executable() {
        let phase = Phase {
            script: "irrelevant".into(),
            set_env: vec![],
            requires_privilege: false,
            timeout_raw: None,
            skip_if: SkipIf::OnPath("sh".into()),
        };
        assert!(should_skip(&phase));
    }

    #[test]
    fn exists_skip_checks_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(&marker, b"").unwrap();
        let phase = Phase {
            script: "irrelevant".into(),
            set_env: vec![],
            requires_privilege: false,
            timeout_raw: None,
            skip_if: SkipIf::Exists(marker.to_string_lossy().to_string()),
        };
        assert!(should_skip(&phase));
    }
}
