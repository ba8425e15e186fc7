//! On-disk layout, daemon directories, secrets, and inventory for shoaladm.
//!
//! This crate provides the storage layer: `StoreLayout` for the managed and
//! legacy directory structures, the directory manager (`ensure_daemon_dirs`,
//! `write_secret`) with explicit ownership and permission bits, and the
//! installation inventory scan that discovers both layouts in one pass.
//!
//! A daemon's directory is the sole durable record of its existence; there
//! is no separate index.

pub mod dirs;
pub mod inventory;
pub mod layout;

pub use dirs::{
    ensure_daemon_dirs, ensure_dir, write_cmd_script, write_secret, Ownership, CMD_MODE,
    DATA_DIR_MODE, LOG_DIR_MODE, SECRET_MODE,
};
pub use inventory::{legacy_cluster_fsid, scan, DiscoveredDaemon, InstallStyle};
pub use layout::StoreLayout;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    PathIo {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Attach path context to an `io::Error`, for use with `map_err`.
pub(crate) fn at(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::PathIo {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_io_error_names_the_path() {
        let e = at(Path::new("/var/lib/shoal/x"))(std::io::Error::other("denied"));
        let msg = e.to_string();
        assert!(msg.contains("/var/lib/shoal/x"));
        assert!(msg.contains("denied"));
    }
}
