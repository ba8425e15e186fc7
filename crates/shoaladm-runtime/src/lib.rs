//! Container engine invocation and systemd unit deployment for shoaladm.
//!
//! This crate implements the execution layer: `ContainerSpec` with its
//! deterministic argv rendering and blocking helper runs, container engine
//! discovery (podman preferred over docker), the key material manager that
//! captures helper-container output, the `InitSystem` facade (real
//! `Systemctl` plus an in-memory `MockInit` for tests), and the unit
//! deployer with content-compare atomic installation.

pub mod container;
pub mod engine;
pub mod init;
pub mod keys;
pub mod units;

pub use container::{container_name, daemon_args, exec_argv, mounts_for, ContainerSpec};
pub use engine::find_engine;
pub use init::{is_absent_failure, query_unit, InitSystem, MockInit, Systemctl};
pub use keys::{
    create_key, extract_keyring, extract_monmap, extract_ownership, gen_ssh_identity,
    initial_keys, normalize_secret, write_monmap, KeySet,
};
pub use units::{
    cluster_slice_name, ensure_base_targets, install_unit, legacy_unit_name,
    remove_cluster_units, remove_daemon_unit, unit_name, write_if_changed, Installed,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no container engine found on PATH (podman, docker)")]
    EngineUnavailable,
    #[error("helper container '{entrypoint}' exited with status {status}: {stderr}")]
    Helper {
        entrypoint: String,
        status: i32,
        stdout: String,
        stderr: String,
    },
    #[error("systemctl {verb} {unit} failed with status {status}: {stderr}")]
    Systemctl {
        verb: String,
        unit: String,
        status: i32,
        stderr: String,
    },
    #[error("unexpected helper output: {0}")]
    UnexpectedOutput(String),
}
