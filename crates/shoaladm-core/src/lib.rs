//! Lifecycle orchestration engine for shoaladm.
//!
//! This crate ties schema, store, and runtime together into the `Engine`,
//! the imperative, single-host orchestrator behind every CLI command:
//! bootstrap, deploy, adopt, removal, listing, and the debug entry points.
//! One command per process invocation; every subprocess blocks; state lives
//! on the filesystem and in the init system, never in memory between runs.

pub mod adopt;
pub mod bootstrap;
pub mod concurrency;
pub mod config;
pub mod engine;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::RunConfig;
pub use engine::{CredSource, Credentials, DaemonListing, Engine, KeyringSource};

use shoaladm_schema::DaemonKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] shoaladm_schema::SchemaError),
    #[error("store error: {0}")]
    Store(#[from] shoaladm_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] shoaladm_runtime::RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("monitors need an address: pass --mon-ip, --mon-network, or --mon-addrv")]
    MissingMonAddress,
    #[error("no keyring source: pass --config-and-keyring, --keyring, or --key")]
    MissingKeyring,
    #[error("--fsid is required for this command")]
    MissingClusterId,
    #[error("refusing to remove a {kind} daemon without --force: this may destroy precious data")]
    ForceRequired { kind: DaemonKind },
    #[error("refusing to remove a cluster without --force: this may destroy precious data")]
    ClusterForceRequired,
    #[error("manager still not available after {attempts} status polls")]
    ReadinessTimeout { attempts: u32 },
    #[error("could not detect a cluster id for the legacy daemon; add fsid to its config")]
    IdentityUndetected,
    #[error("adoption of style '{0}' is not supported")]
    UnsupportedAdoptionStyle(String),
    #[error("interrupted before completion")]
    Interrupted,
    #[error("unexpected cluster status output: {0}")]
    UnexpectedStatus(String),
}
