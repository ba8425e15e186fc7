//! One-time migration of a legacy (pre-container) daemon into the managed
//! layout, without data loss.

use crate::engine::path_io;
use crate::{CoreError, Engine};
use shoaladm_runtime::init::query_unit;
use shoaladm_runtime::units;
use shoaladm_schema::DaemonName;
use shoaladm_store::{dirs, inventory, DATA_DIR_MODE, LOG_DIR_MODE};
use std::path::Path;
use tracing::{info, warn};

impl Engine {
    /// Adopt one legacy daemon: recover its identity, stop the old unit,
    /// move data and logs into the managed layout, and install the managed
    /// unit, started only if the legacy unit had been running.
    pub fn adopt(&self, name: &DaemonName, style: &str, cluster: &str) -> Result<(), CoreError> {
        if style != "legacy" {
            return Err(CoreError::UnsupportedAdoptionStyle(style.to_owned()));
        }
        let layout = &self.config.layout;

        // The cluster must already know its own identity; nothing has been
        // touched yet if it does not.
        let cluster_id = inventory::legacy_cluster_fsid(layout, name.kind, cluster, &name.id)
            .ok_or(CoreError::IdentityUndetected)?;

        let legacy_unit = units::legacy_unit_name(name);
        let (enabled, active) = query_unit(self.init(), &legacy_unit);
        if active {
            info!("stopping legacy unit {legacy_unit}");
            self.init().stop(&legacy_unit)?;
        }
        if enabled {
            info!("disabling legacy unit {legacy_unit}");
            self.init().disable(&legacy_unit)?;
        }

        let owner = self.owner()?;

        info!("moving data into the managed layout");
        dirs::ensure_dir(&layout.cluster_dir(&cluster_id), owner, DATA_DIR_MODE)?;
        let legacy_dir = layout.legacy_daemon_dir(name.kind, cluster, &name.id);
        let data_dir = layout.daemon_dir(&cluster_id, name);
        std::fs::rename(&legacy_dir, &data_dir).map_err(path_io(&legacy_dir))?;

        let conf_path = layout.legacy_conf_file(cluster);
        let config_text = std::fs::read_to_string(&conf_path).map_err(path_io(&conf_path))?;
        dirs::write_secret(&data_dir, "config", &config_text, owner)?;
        dirs::ensure_dir(&data_dir, owner, DATA_DIR_MODE)?;

        info!("moving logs");
        let log_dir = layout.log_dir(&cluster_id);
        dirs::ensure_dir(&log_dir, owner, LOG_DIR_MODE)?;
        move_legacy_logs(layout.log_root(), &log_dir, cluster, name);

        info!("installing the managed unit");
        let spec = self.daemon_container(&cluster_id, name);
        // Enabled unconditionally; a deliberately stopped daemon stays stopped.
        self.deploy_units(&cluster_id, name, &spec, active)?;
        Ok(())
    }
}

/// Move `<cluster>-<kind>.<id>.log*` out of the legacy log directory.
/// Best-effort: a log that cannot move is warned about, never fatal.
fn move_legacy_logs(log_root: &Path, log_dir: &Path, cluster: &str, name: &DaemonName) {
    let prefix = format!("{cluster}-{name}.log");
    let entries = match std::fs::read_dir(log_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("cannot read {}: {e}", log_root.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.starts_with(&prefix) {
            continue;
        }
        if let Err(e) = std::fs::rename(entry.path(), log_dir.join(&file_name)) {
            warn!("unable to move log file {file_name}: {e}");
        }
    }
}
