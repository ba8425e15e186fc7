//! Cluster identity, daemon naming, and config/keyring text for shoaladm.
//!
//! This crate defines the schema layer: the `ClusterId` identifier and its
//! resolution rules (`ClusterIdentity`), daemon kinds and `<kind>.<id>`
//! naming (`DaemonKind`, `DaemonName`), and the minimal INI-shaped cluster
//! config and keyring texts exchanged with the daemons.

pub mod conf;
pub mod identity;
pub mod kind;
pub mod types;

pub use conf::{
    bootstrap_keyring, keyring_entry, mgr_keyring, mon_section, parse_global_fsid,
    render_cluster_conf, MonAddr,
};
pub use identity::{resolve_host_id, ClusterIdentity};
pub use kind::{DaemonKind, DaemonName};
pub use types::ClusterId;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid cluster id '{0}': expected a UUID")]
    InvalidClusterId(String),
    #[error("unknown daemon kind '{0}', expected one of mon, mgr, osd, mds, rgw")]
    UnknownDaemonKind(String),
    #[error("invalid daemon name '{0}', expected '<kind>.<id>'")]
    InvalidDaemonName(String),
}
