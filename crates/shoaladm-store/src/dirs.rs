//! Directory and secret-file materialization with explicit ownership.
//!
//! Every operation here is `ensure`-shaped: re-invocation on existing paths
//! re-asserts ownership and mode but never deletes or rewrites contents the
//! caller did not pass in. Secret files are created with owner-only access
//! before any bytes reach them.

use crate::layout::StoreLayout;
use crate::{at, StoreError};
use shoaladm_schema::{ClusterId, DaemonName};
use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{chown, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Daemon data directories: owner-only.
pub const DATA_DIR_MODE: u32 = 0o700;
/// Shared log directory: owner and group.
pub const LOG_DIR_MODE: u32 = 0o770;
/// Keyrings, configs, and other secret files.
pub const SECRET_MODE: u32 = 0o600;
/// The per-daemon `cmd` wrapper script.
pub const CMD_MODE: u32 = 0o700;

/// Numeric owner applied to daemon directories and files.
///
/// Always explicit: resolved from `--uid`/`--gid` or extracted from the
/// daemon image, never silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

impl Ownership {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// The invoking process's own uid/gid.
    pub fn current() -> Self {
        Self {
            uid: current_uid(),
            gid: current_gid(),
        }
    }
}

/// Safe wrapper around libc::getuid().
#[allow(unsafe_code)]
fn current_uid() -> u32 {
    // SAFETY: getuid() is always safe — no arguments, no side effects, cannot fail.
    unsafe { libc::getuid() }
}

/// Safe wrapper around libc::getgid().
#[allow(unsafe_code)]
fn current_gid() -> u32 {
    // SAFETY: getgid() is always safe — no arguments, no side effects, cannot fail.
    unsafe { libc::getgid() }
}

/// Create `path` if absent, then assert ownership and mode.
///
/// `create_dir_all`'s mode is masked by the umask, so the mode is chmodded
/// explicitly afterwards.
pub fn ensure_dir(path: &Path, owner: Ownership, mode: u32) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(at(path))?;
    chown(path, Some(owner.uid), Some(owner.gid)).map_err(at(path))?;
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(at(path))?;
    Ok(())
}

/// Materialize the data and log directories for one daemon instance.
///
/// Returns `(data_dir, log_dir)`. Idempotent with respect to contents.
pub fn ensure_daemon_dirs(
    layout: &StoreLayout,
    cluster_id: &ClusterId,
    name: &DaemonName,
    owner: Ownership,
) -> Result<(PathBuf, PathBuf), StoreError> {
    ensure_dir(&layout.cluster_dir(cluster_id), owner, DATA_DIR_MODE)?;
    let data_dir = layout.daemon_dir(cluster_id, name);
    ensure_dir(&data_dir, owner, DATA_DIR_MODE)?;
    let log_dir = layout.log_dir(cluster_id);
    ensure_dir(&log_dir, owner, LOG_DIR_MODE)?;
    debug!("daemon dirs ready: {}", data_dir.display());
    Ok((data_dir, log_dir))
}

/// Write `contents` to `dir/name` with mode `0o600` set at creation, so the
/// file is never observable with wider permissions, then chown to `owner`.
pub fn write_secret(
    dir: &Path,
    name: &str,
    contents: &str,
    owner: Ownership,
) -> Result<PathBuf, StoreError> {
    let path = dir.join(name);
    write_with_mode(&path, contents, SECRET_MODE)?;
    chown(&path, Some(owner.uid), Some(owner.gid)).map_err(at(&path))?;
    Ok(path)
}

/// Write the executable `cmd` wrapper script the unit's `ExecStart` runs.
pub fn write_cmd_script(dir: &Path, argv: &[String]) -> Result<PathBuf, StoreError> {
    let path = dir.join("cmd");
    let script = format!("#!/bin/sh\n{}\n", argv.join(" "));
    write_with_mode(&path, &script, CMD_MODE)?;
    Ok(path)
}

fn write_with_mode(path: &Path, contents: &str, mode: u32) -> Result<(), StoreError> {
    let mut f = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
        .map_err(at(path))?;
    // An existing file keeps its old mode; re-assert before writing.
    f.set_permissions(Permissions::from_mode(mode))
        .map_err(at(path))?;
    f.write_all(contents.as_bytes()).map_err(at(path))?;
    Ok(())
}
