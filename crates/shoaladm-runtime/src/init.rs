//! Thin facade over the init system.
//!
//! Every query re-asks systemd; there is no cached model of unit state.
//! The orchestrator receives an `&dyn InitSystem`, so tests run against
//! [`MockInit`] and never require a real init system.

use crate::RuntimeError;
use std::collections::HashMap;
use std::process::Command;
use std::sync::Mutex;
use tracing::debug;

pub trait InitSystem: Send + Sync {
    /// Re-read unit files after install/removal (`systemctl daemon-reload`).
    fn reload(&self) -> Result<(), RuntimeError>;

    /// Run one verb against one unit (`start`, `stop`, `enable`, ...).
    fn action(&self, verb: &str, unit: &str) -> Result<(), RuntimeError>;

    /// Whether the unit is enabled. Any failure, including an unknown
    /// unit, is `false`; absence is ordinary state, not an error.
    fn is_enabled(&self, unit: &str) -> bool;

    /// Whether the unit is active. Failures are `false`, as above.
    fn is_active(&self, unit: &str) -> bool;

    fn enable(&self, unit: &str) -> Result<(), RuntimeError> {
        self.action("enable", unit)
    }

    fn disable(&self, unit: &str) -> Result<(), RuntimeError> {
        self.action("disable", unit)
    }

    fn start(&self, unit: &str) -> Result<(), RuntimeError> {
        self.action("start", unit)
    }

    fn stop(&self, unit: &str) -> Result<(), RuntimeError> {
        self.action("stop", unit)
    }
}

/// Enabled/active state of one unit, queried independently.
pub fn query_unit(init: &dyn InitSystem, unit: &str) -> (bool, bool) {
    (init.is_enabled(unit), init.is_active(unit))
}

impl<T: InitSystem + ?Sized> InitSystem for std::sync::Arc<T> {
    fn reload(&self) -> Result<(), RuntimeError> {
        (**self).reload()
    }

    fn action(&self, verb: &str, unit: &str) -> Result<(), RuntimeError> {
        (**self).action(verb, unit)
    }

    fn is_enabled(&self, unit: &str) -> bool {
        (**self).is_enabled(unit)
    }

    fn is_active(&self, unit: &str) -> bool {
        (**self).is_active(unit)
    }
}

/// The real thing: shells out to `systemctl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Systemctl;

impl Systemctl {
    fn query(self, verb: &str, unit: &str, expect: &str) -> bool {
        match Command::new("systemctl").args([verb, unit]).output() {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim() == expect,
            Err(e) => {
                debug!("systemctl {verb} {unit} query failed: {e}");
                false
            }
        }
    }
}

impl InitSystem for Systemctl {
    fn reload(&self) -> Result<(), RuntimeError> {
        run_systemctl("daemon-reload", None)
    }

    fn action(&self, verb: &str, unit: &str) -> Result<(), RuntimeError> {
        run_systemctl(verb, Some(unit))
    }

    fn is_enabled(&self, unit: &str) -> bool {
        self.query("is-enabled", unit, "enabled")
    }

    fn is_active(&self, unit: &str) -> bool {
        self.query("is-active", unit, "active")
    }
}

fn run_systemctl(verb: &str, unit: Option<&str>) -> Result<(), RuntimeError> {
    let mut cmd = Command::new("systemctl");
    cmd.arg(verb);
    if let Some(unit) = unit {
        cmd.arg(unit);
    }
    let output = cmd.output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(RuntimeError::Systemctl {
            verb: verb.to_owned(),
            unit: unit.unwrap_or_default().to_owned(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Whether a systemctl failure means the unit simply does not exist.
pub fn is_absent_failure(err: &RuntimeError) -> bool {
    match err {
        RuntimeError::Systemctl { stderr, .. } => {
            let msg = stderr.to_lowercase();
            msg.contains("not loaded") || msg.contains("not found") || msg.contains("no such file")
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct UnitState {
    enabled: bool,
    active: bool,
}

/// In-memory init system for tests: tracks per-unit enabled/active state,
/// counts reloads, and records every action in order.
#[derive(Default)]
pub struct MockInit {
    units: Mutex<HashMap<String, UnitState>>,
    reloads: Mutex<usize>,
    actions: Mutex<Vec<(String, String)>>,
}

impl MockInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reload_count(&self) -> usize {
        *self.reloads.lock().expect("mock lock")
    }

    pub fn actions(&self) -> Vec<(String, String)> {
        self.actions.lock().expect("mock lock").clone()
    }

    /// Seed a unit's state, as if it pre-existed.
    pub fn seed(&self, unit: &str, enabled: bool, active: bool) {
        self.units
            .lock()
            .expect("mock lock")
            .insert(unit.to_owned(), UnitState { enabled, active });
    }
}

impl InitSystem for MockInit {
    fn reload(&self) -> Result<(), RuntimeError> {
        *self.reloads.lock().expect("mock lock") += 1;
        Ok(())
    }

    fn action(&self, verb: &str, unit: &str) -> Result<(), RuntimeError> {
        self.actions
            .lock()
            .expect("mock lock")
            .push((verb.to_owned(), unit.to_owned()));
        let mut units = self.units.lock().expect("mock lock");
        let absent = !units.contains_key(unit);
        match verb {
            "enable" => units.entry(unit.to_owned()).or_default().enabled = true,
            "start" | "restart" => units.entry(unit.to_owned()).or_default().active = true,
            "stop" | "disable" if absent => {
                return Err(RuntimeError::Systemctl {
                    verb: verb.to_owned(),
                    unit: unit.to_owned(),
                    status: 5,
                    stderr: format!("Unit {unit} not loaded."),
                });
            }
            "stop" => {
                if let Some(state) = units.get_mut(unit) {
                    state.active = false;
                }
            }
            "disable" => {
                if let Some(state) = units.get_mut(unit) {
                    state.enabled = false;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_enabled(&self, unit: &str) -> bool {
        self.units
            .lock()
            .expect("mock lock")
            .get(unit)
            .is_some_and(|s| s.enabled)
    }

    fn is_active(&self, unit: &str) -> bool {
        self.units
            .lock()
            .expect("mock lock")
            .get(unit)
            .is_some_and(|s| s.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_tracks_enable_and_start() {
        let init = MockInit::new();
        assert_eq!(query_unit(&init, "u.service"), (false, false));

        init.enable("u.service").unwrap();
        init.start("u.service").unwrap();
        assert_eq!(query_unit(&init, "u.service"), (true, true));

        init.stop("u.service").unwrap();
        assert_eq!(query_unit(&init, "u.service"), (true, false));
    }

    #[test]
    fn mock_stop_of_absent_unit_fails_like_systemctl() {
        let init = MockInit::new();
        let err = init.stop("ghost.service").unwrap_err();
        assert!(is_absent_failure(&err));
    }

    #[test]
    fn mock_counts_reloads_and_records_actions() {
        let init = MockInit::new();
        init.reload().unwrap();
        init.reload().unwrap();
        init.enable("a.service").unwrap();
        assert_eq!(init.reload_count(), 2);
        assert_eq!(
            init.actions(),
            vec![("enable".to_owned(), "a.service".to_owned())]
        );
    }

    #[test]
    fn absent_failure_is_detected_by_message() {
        let absent = RuntimeError::Systemctl {
            verb: "stop".to_owned(),
            unit: "x".to_owned(),
            status: 5,
            stderr: "Unit x not loaded.".to_owned(),
        };
        assert!(is_absent_failure(&absent));

        let other = RuntimeError::Systemctl {
            verb: "stop".to_owned(),
            unit: "x".to_owned(),
            status: 1,
            stderr: "Access denied".to_owned(),
        };
        assert!(!is_absent_failure(&other));
    }
}
