//! Container invocation specs and their deterministic argv rendering.
//!
//! A `ContainerSpec` is a pure value: rendering it twice with the same
//! inputs yields an identical command line, which unit-file installation
//! relies on for idempotence. Flag order is fixed: engine args, container
//! name, environment, volume mounts in insertion order, entrypoint, image,
//! positional args.

use crate::RuntimeError;
use serde::Serialize;
use shoaladm_schema::{identity, ClusterId, DaemonKind, DaemonName};
use shoaladm_store::StoreLayout;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub image: String,
    pub entrypoint: String,
    pub args: Vec<String>,
    /// `(host_path, container_path)` pairs; order is preserved in the argv.
    pub volumes: Vec<(PathBuf, String)>,
    /// Extra engine flags, e.g. `--privileged`.
    pub engine_args: Vec<String>,
    /// Fixed container name, set for daemon containers.
    pub name: Option<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            entrypoint: entrypoint.into(),
            args: Vec::new(),
            volumes: Vec::new(),
            engine_args: Vec::new(),
            name: None,
        }
    }

    /// Argv for a one-shot or daemon `run` invocation.
    pub fn run_argv(&self, engine: &Path) -> Vec<String> {
        let mut argv = vec![
            engine.to_string_lossy().into_owned(),
            "run".to_owned(),
            "--rm".to_owned(),
            "--net=host".to_owned(),
        ];
        self.push_common(&mut argv);
        argv.push("--entrypoint".to_owned());
        argv.push(self.entrypoint.clone());
        argv.push(self.image.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Argv for an interactive shell in place of the entrypoint.
    pub fn shell_argv(&self, engine: &Path) -> Vec<String> {
        let mut argv = vec![
            engine.to_string_lossy().into_owned(),
            "run".to_owned(),
            "--rm".to_owned(),
            "--net=host".to_owned(),
            "-it".to_owned(),
        ];
        self.push_common(&mut argv);
        argv.push("--entrypoint".to_owned());
        argv.push("/bin/bash".to_owned());
        argv.push(self.image.clone());
        argv
    }

    fn push_common(&self, argv: &mut Vec<String>) {
        argv.extend(self.engine_args.iter().cloned());
        if let Some(name) = &self.name {
            argv.push("--name".to_owned());
            argv.push(name.clone());
        }
        argv.push("-e".to_owned());
        argv.push(format!("CONTAINER_IMAGE={}", self.image));
        argv.push("-e".to_owned());
        argv.push(format!("NODE_NAME={}", identity::local_hostname()));
        for (host, container) in &self.volumes {
            argv.push("-v".to_owned());
            argv.push(format!("{}:{container}", host.display()));
        }
    }

    /// Run the container, block until it exits, and capture its output.
    ///
    /// A non-zero exit is surfaced as [`RuntimeError::Helper`] carrying the
    /// captured stdout/stderr verbatim; there is no retry.
    pub fn run(&self, engine: &Path) -> Result<String, RuntimeError> {
        let argv = self.run_argv(engine);
        debug!("running helper: {}", argv.join(" "));
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            Err(RuntimeError::Helper {
                entrypoint: self.entrypoint.clone(),
                status: output.status.code().unwrap_or(-1),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

/// Argv to attach to or run a command inside an already-started container.
pub fn exec_argv(engine: &Path, cname: &str, privileged: bool, command: &[String]) -> Vec<String> {
    let mut argv = vec![engine.to_string_lossy().into_owned(), "exec".to_owned()];
    if privileged {
        argv.push("--privileged".to_owned());
    }
    argv.push("-it".to_owned());
    argv.push(cname.to_owned());
    argv.extend(command.iter().cloned());
    argv
}

/// Fixed name of a daemon's container.
pub fn container_name(cluster_id: &ClusterId, name: &DaemonName) -> String {
    format!("shoal-{cluster_id}-{name}")
}

/// Standard arguments passed to every daemon binary.
pub fn daemon_args(cluster_id: &ClusterId, name: &DaemonName) -> Vec<String> {
    vec![
        "--default-log-to-file=false".to_owned(),
        "--default-log-to-stderr=true".to_owned(),
        "--default-admin-socket".to_owned(),
        format!("/var/run/shoal/{cluster_id}-{name}.asok"),
        "--setuser".to_owned(),
        "shoal".to_owned(),
        "--setgroup".to_owned(),
        "shoal".to_owned(),
    ]
}

/// Volume mounts for a daemon of the given kind.
///
/// With no instance id (shell and volume-helper paths) only the shared
/// mounts for the kind are produced.
pub fn mounts_for(
    layout: &StoreLayout,
    cluster_id: Option<&ClusterId>,
    kind: DaemonKind,
    id: Option<&str>,
) -> Vec<(PathBuf, String)> {
    let mut mounts = Vec::new();

    if let Some(cluster_id) = cluster_id {
        mounts.push((layout.log_dir(cluster_id), "/var/log/shoal:z".to_owned()));

        if let Some(id) = id {
            let name = DaemonName::new(kind, id);
            let data_dir = layout.daemon_dir(cluster_id, &name);
            mounts.push((
                data_dir.clone(),
                format!("/var/lib/shoal/{kind}/shoal-{id}:z"),
            ));
            mounts.push((
                data_dir.join("config"),
                "/etc/shoal/shoal.conf:z".to_owned(),
            ));
        }
    }

    if matches!(kind, DaemonKind::Mon | DaemonKind::Osd) {
        mounts.push((PathBuf::from("/dev"), "/dev:z".to_owned()));
        mounts.push((PathBuf::from("/run/udev"), "/run/udev:z".to_owned()));
    }
    if kind == DaemonKind::Osd {
        mounts.push((PathBuf::from("/sys"), "/sys:z".to_owned()));
        mounts.push((PathBuf::from("/run/lvm"), "/run/lvm:z".to_owned()));
        mounts.push((PathBuf::from("/run/lock/lvm"), "/run/lock/lvm:z".to_owned()));
    }

    mounts
}
