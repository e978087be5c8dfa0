//! Per-component FSM (spec §4.H), grounded in the `Transitions` visitor over
//! `State`/`Event` in `nucleus/src/lifecycle/lifecycle_fsm.{hpp,cpp}` and
//! re-expressed as a pure function over an explicit enum rather than a
//! `std::variant` double-dispatch, since Rust's `match` gives the same
//! exhaustiveness check without the visitor boilerplate.

use crate::status::ComponentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Initial,
    New,
    Installing,
    Installed,
    Broken,
    Startup,
    Running,
    Stopping,
    Finished,
}

impl State {
    pub fn status(self) -> ComponentStatus {
        match self {
            State::Initial | State::New => ComponentStatus::New,
            State::Installing => ComponentStatus::New,
            State::Installed => ComponentStatus::Installed,
            State::Broken => ComponentStatus::Broken,
            State::Startup => ComponentStatus::Installed,
            State::Running => ComponentStatus::Running,
            State::Stopping => ComponentStatus::Stopping,
            State::Finished => ComponentStatus::Finished,
        }
    }
}

/// Flags on an `update` request, matching `state_data::{start,restart,
/// reinstall,stop}` in the original.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    pub start: bool,
    pub restart: bool,
    pub reinstall: bool,
    pub stop: bool,
}

impl UpdateFlags {
    fn wants_start(self) -> bool {
        self.start || self.restart || self.reinstall
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Init,
    Update(UpdateFlags),
    DepsReady,
    ScriptOk,
    /// A phase script's failure, together with whether the error-rate
    /// window (spec §4.H, [`crate::error_rate::ErrorRate`]) has now
    /// tripped Broken for this phase.
    ScriptErr { broken: bool },
}

/// Applies `event` to `state`, given whether the component defines an
/// `install` phase (only relevant leaving `New`). `Stopping`'s
/// `script-err` path folds the original's transient `KillWStopError` state
/// directly into its `Broken`/`Finished` outcome — both representations
/// are reachable only through this one event, so there is nothing an
/// external observer could see in between.
pub fn apply(state: State, event: Event, has_install_phase: bool) -> State {
    match (state, event) {
        (State::Initial, Event::Init) => State::New,

        (State::New, Event::Update(flags)) if flags.wants_start() => {
            if has_install_phase {
                State::Installing
            } else {
                State::Installed
            }
        }

        (State::Installing, Event::ScriptOk) => State::Installed,
        (State::Installing, Event::ScriptErr { broken }) => {
            if broken {
                State::Broken
            } else {
                State::Installing
            }
        }

        (State::Installed, Event::DepsReady) => State::Startup,

        (State::Startup, Event::ScriptOk) => State::Running,
        (State::Startup, Event::ScriptErr { broken }) => {
            if broken {
                State::Broken
            } else {
                State::Installed
            }
        }

        (State::Running, Event::Update(flags)) if flags.stop => State::Stopping,

        (State::Stopping, Event::ScriptOk) => State::Finished,
        (State::Stopping, Event::ScriptErr { broken }) => {
            if broken {
                State::Broken
            } else {
                State::Finished
            }
        }

        (State::Finished, Event::Update(flags)) if flags.restart || flags.reinstall => State::Installed,

        // No matching transition: state holds (mirrors the original's
        // `std::optional<State>` guard returning `{}`).
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> UpdateFlags {
        UpdateFlags { start: true, ..Default::default() }
    }

    fn stop() -> UpdateFlags {
        UpdateFlags { stop: true, ..Default::default() }
    }

    #[test]
    fn full_happy_path_with_install_phase() {
        let mut s = State::Initial;
        s = apply(s, Event::Init, true);
        assert_eq!(s, State::New);
        s = apply(s, Event::Update(start()), true);
        assert_eq!(s, State::Installing);
        s = apply(s, Event::ScriptOk, true);
        assert_eq!(s, State::Installed);
        s = apply(s, Event::DepsReady, true);
        assert_eq!(s, State::Startup);
        s = apply(s, Event::ScriptOk, true);
        assert_eq!(s, State::Running);
        s = apply(s, Event::Update(stop()), true);
        assert_eq!(s, State::Stopping);
        s = apply(s, Event::ScriptOk, true);
        assert_eq!(s, State::Finished);
    }

    #[test]
    fn no_install_phase_skips_installing() {
        let mut s = State::New;
        s = apply(s, Event::Update(start()), false);
        assert_eq!(s, State::Installed);
    }

    #[test]
    fn repeated_script_errors_eventually_trip_broken() {
        let mut s = State::Startup;
        s = apply(s, Event::ScriptErr { broken: false }, true);
        assert_eq!(s, State::Installed);
        let mut s2 = State::Startup;
        s2 = apply(s2, Event::ScriptErr { broken: true }, true);
        assert_eq!(s2, State::Broken);
    }

    #[test]
    fn finished_restarts_back_to_installed() {
        let s = apply(State::Finished, Event::Update(UpdateFlags { restart: true, ..Default::default() }), true);
        assert_eq!(s, State::Installed);
    }

    #[test]
    fn unmatched_event_leaves_state_unchanged() {
        let s = apply(State::Broken, Event::ScriptOk, true);
        assert_eq!(s, State::Broken);
    }
}
