//! Systemd unit deployment for daemon containers.
//!
//! One parameterized unit (`shoal-<cluster_id>@.service`) serves every
//! daemon of a cluster; instances are keyed by `<kind>.<id>`. Unit files
//! are written through a `.new` temp path and renamed into place only when
//! their content actually changed, so repeated deploys leave mtimes alone.
//! The daemon-reload primitive is still invoked on every install.

use crate::init::{is_absent_failure, InitSystem};
use crate::RuntimeError;
use shoaladm_schema::{ClusterId, DaemonName};
use shoaladm_store::StoreLayout;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of a unit-file write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installed {
    /// Content differed; the file was atomically replaced.
    Updated,
    /// Content was identical; the existing file was left untouched.
    Unchanged,
}

/// Instance unit of one managed daemon.
pub fn unit_name(cluster_id: &ClusterId, name: &DaemonName) -> String {
    format!("shoal-{cluster_id}@{name}.service")
}

/// Unit shape used by pre-container installations, one template per kind.
pub fn legacy_unit_name(name: &DaemonName) -> String {
    format!("shoal-{}@{}.service", name.kind, name.id)
}

/// The transient slice systemd groups a cluster's daemon scopes under.
pub fn cluster_slice_name(cluster_id: &ClusterId) -> String {
    let escaped = format!("shoal-{cluster_id}").replace('-', "\\x2d");
    format!("system-{escaped}.slice")
}

pub fn render_unit(cluster_id: &ClusterId, engine: &Path, data_root: &Path) -> String {
    let engine = engine.display();
    let data_root = data_root.display();
    format!(
        "[Unit]\n\
         Description=shoal daemon for cluster {cluster_id}\n\
         After=network-online.target local-fs.target time-sync.target\n\
         Wants=network-online.target local-fs.target time-sync.target\n\
         PartOf=shoal-{cluster_id}.target\n\
         Before=shoal-{cluster_id}.target\n\
         \n\
         [Service]\n\
         LimitNOFILE=1048576\n\
         LimitNPROC=1048576\n\
         EnvironmentFile=-/etc/environment\n\
         ExecStartPre=-{engine} rm shoal-{cluster_id}-%i\n\
         ExecStartPre=-mkdir -p /var/run/shoal\n\
         ExecStart={data_root}/{cluster_id}/%i/cmd\n\
         ExecStop=-{engine} stop shoal-{cluster_id}-%i\n\
         ExecStopPost=-/bin/rm -f /var/run/shoal/{cluster_id}-%i.asok\n\
         Restart=on-failure\n\
         RestartSec=10s\n\
         TimeoutStartSec=120\n\
         TimeoutStopSec=15\n\
         StartLimitInterval=30min\n\
         StartLimitBurst=5\n\
         \n\
         [Install]\n\
         WantedBy=shoal-{cluster_id}.target\n"
    )
}

fn render_product_target() -> String {
    "[Unit]\n\
     Description=all shoal clusters and daemons\n\
     \n\
     [Install]\n\
     WantedBy=multi-user.target\n"
        .to_owned()
}

fn render_cluster_target(cluster_id: &ClusterId) -> String {
    format!(
        "[Unit]\n\
         Description=shoal cluster {cluster_id}\n\
         PartOf=shoal.target\n\
         Before=shoal.target\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target shoal.target\n"
    )
}

/// Write `content` to `path` via `<path>.new` + rename, skipping the write
/// entirely when the existing content is identical.
pub fn write_if_changed(path: &Path, content: &str) -> Result<Installed, RuntimeError> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == content {
            return Ok(Installed::Unchanged);
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let staged = path.with_file_name(format!("{file_name}.new"));
    fs::write(&staged, content)?;
    fs::rename(&staged, path)?;
    Ok(Installed::Updated)
}

/// Make sure `shoal.target` and the cluster's target exist; each is enabled
/// and started only the first time it is created.
pub fn ensure_base_targets(
    layout: &StoreLayout,
    init: &dyn InitSystem,
    cluster_id: &ClusterId,
) -> Result<(), RuntimeError> {
    let product = layout.product_target_file();
    let existed = product.exists();
    write_if_changed(&product, &render_product_target())?;
    if !existed {
        init.enable("shoal.target")?;
        init.start("shoal.target")?;
    }

    let cluster = layout.cluster_target_file(cluster_id);
    let existed = cluster.exists();
    write_if_changed(&cluster, &render_cluster_target(cluster_id))?;
    if !existed {
        init.enable(&format!("shoal-{cluster_id}.target"))?;
        init.start(&format!("shoal-{cluster_id}.target"))?;
    }
    Ok(())
}

/// Install the cluster's parameterized unit and bring up one instance.
///
/// Always reloads the init system after touching unit content, then
/// enables the instance and starts it unless `start` is false.
pub fn install_unit(
    layout: &StoreLayout,
    init: &dyn InitSystem,
    cluster_id: &ClusterId,
    name: &DaemonName,
    engine: &Path,
    start: bool,
) -> Result<(String, Installed), RuntimeError> {
    ensure_base_targets(layout, init, cluster_id)?;

    let outcome = write_if_changed(
        &layout.unit_file(cluster_id),
        &render_unit(cluster_id, engine, layout.data_root()),
    )?;
    init.reload()?;

    let unit = unit_name(cluster_id, name);
    init.enable(&unit)?;
    if start {
        init.start(&unit)?;
        info!("started {unit}");
    }
    Ok((unit, outcome))
}

/// Stop and disable one daemon's unit instance. Absence is tolerated; any
/// other failure escalates. The shared template file stays in place.
pub fn remove_daemon_unit(init: &dyn InitSystem, unit: &str) -> Result<(), RuntimeError> {
    tolerate_absent(init.stop(unit))?;
    tolerate_absent(init.disable(unit))?;
    Ok(())
}

/// Tear down every unit artifact of one cluster. Stops are best-effort;
/// file removal failures other than absence propagate.
pub fn remove_cluster_units(
    layout: &StoreLayout,
    init: &dyn InitSystem,
    cluster_id: &ClusterId,
) -> Result<(), RuntimeError> {
    let target = format!("shoal-{cluster_id}.target");
    for verb in ["stop", "disable"] {
        if let Err(e) = init.action(verb, &target) {
            warn!("could not {verb} {target}: {e}");
        }
    }
    let slice = cluster_slice_name(cluster_id);
    if let Err(e) = init.stop(&slice) {
        warn!("could not stop {slice}: {e}");
    }

    remove_file_if_present(&layout.unit_file(cluster_id))?;
    remove_file_if_present(&layout.cluster_target_file(cluster_id))?;
    let wants = layout.cluster_target_wants_dir(cluster_id);
    if wants.exists() {
        fs::remove_dir_all(&wants)?;
    }
    init.reload()?;
    Ok(())
}

fn remove_file_if_present(path: &Path) -> Result<(), RuntimeError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn tolerate_absent(result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Err(ref e) if is_absent_failure(e) => Ok(()),
        other => other,
    }
}
