use shoaladm_schema::{ClusterId, DaemonKind, DaemonName};
use std::path::{Path, PathBuf};

/// Directory layout for managed and legacy daemon installations.
///
/// Managed daemons live at `<data>/<cluster_id>/<kind>.<id>` with a shared
/// log directory `<log>/<cluster_id>`; legacy (pre-container) daemons live
/// at `<data>/<kind>/<cluster>-<id>`. Unit files go to the init system's
/// unit directory. All accessors are pure path computation.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    data_root: PathBuf,
    log_root: PathBuf,
    unit_root: PathBuf,
    conf_root: PathBuf,
}

pub const DEFAULT_DATA_ROOT: &str = "/var/lib/shoal";
pub const DEFAULT_LOG_ROOT: &str = "/var/log/shoal";
pub const DEFAULT_UNIT_ROOT: &str = "/etc/systemd/system";
pub const DEFAULT_CONF_ROOT: &str = "/etc/shoal";

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT, DEFAULT_LOG_ROOT, DEFAULT_UNIT_ROOT)
    }
}

impl StoreLayout {
    pub fn new(
        data_root: impl Into<PathBuf>,
        log_root: impl Into<PathBuf>,
        unit_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            data_root: data_root.into(),
            log_root: log_root.into(),
            unit_root: unit_root.into(),
            conf_root: PathBuf::from(DEFAULT_CONF_ROOT),
        }
    }

    /// Override the legacy system config directory (`/etc/shoal`).
    pub fn with_conf_root(mut self, conf_root: impl Into<PathBuf>) -> Self {
        self.conf_root = conf_root.into();
        self
    }

    #[inline]
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    #[inline]
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    #[inline]
    pub fn unit_root(&self) -> &Path {
        &self.unit_root
    }

    #[inline]
    pub fn cluster_dir(&self, cluster_id: &ClusterId) -> PathBuf {
        self.data_root.join(cluster_id.as_str())
    }

    #[inline]
    pub fn daemon_dir(&self, cluster_id: &ClusterId, name: &DaemonName) -> PathBuf {
        self.cluster_dir(cluster_id).join(name.to_string())
    }

    #[inline]
    pub fn log_dir(&self, cluster_id: &ClusterId) -> PathBuf {
        self.log_root.join(cluster_id.as_str())
    }

    #[inline]
    pub fn legacy_kind_dir(&self, kind: DaemonKind) -> PathBuf {
        self.data_root.join(kind.as_str())
    }

    #[inline]
    pub fn legacy_daemon_dir(&self, kind: DaemonKind, cluster: &str, id: &str) -> PathBuf {
        self.legacy_kind_dir(kind).join(format!("{cluster}-{id}"))
    }

    #[inline]
    pub fn legacy_conf_file(&self, cluster: &str) -> PathBuf {
        self.conf_root.join(format!("{cluster}.conf"))
    }

    /// The parameterized unit serving every daemon of one cluster.
    #[inline]
    pub fn unit_file(&self, cluster_id: &ClusterId) -> PathBuf {
        self.unit_root.join(format!("shoal-{cluster_id}@.service"))
    }

    /// Target grouping all daemons of one cluster.
    #[inline]
    pub fn cluster_target_file(&self, cluster_id: &ClusterId) -> PathBuf {
        self.unit_root.join(format!("shoal-{cluster_id}.target"))
    }

    /// Target grouping every cluster on the host.
    #[inline]
    pub fn product_target_file(&self) -> PathBuf {
        self.unit_root.join("shoal.target")
    }

    #[inline]
    pub fn cluster_target_wants_dir(&self, cluster_id: &ClusterId) -> PathBuf {
        self.unit_root
            .join(format!("shoal-{cluster_id}.target.wants"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoaladm_schema::DaemonName;

    fn layout() -> StoreLayout {
        StoreLayout::new("/var/lib/shoal", "/var/log/shoal", "/etc/systemd/system")
    }

    fn id() -> ClusterId {
        ClusterId::parse("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90").unwrap()
    }

    #[test]
    fn managed_paths_are_namespaced_by_cluster() {
        let name: DaemonName = "mon.a".parse().unwrap();
        assert_eq!(
            layout().daemon_dir(&id(), &name),
            PathBuf::from("/var/lib/shoal/2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90/mon.a")
        );
        assert_eq!(
            layout().log_dir(&id()),
            PathBuf::from("/var/log/shoal/2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90")
        );
    }

    #[test]
    fn legacy_paths_are_namespaced_by_kind_and_cluster() {
        assert_eq!(
            layout().legacy_daemon_dir(DaemonKind::Osd, "shoal", "3"),
            PathBuf::from("/var/lib/shoal/osd/shoal-3")
        );
        assert_eq!(
            layout().legacy_conf_file("shoal"),
            PathBuf::from("/etc/shoal/shoal.conf")
        );
    }

    #[test]
    fn unit_paths() {
        let l = layout();
        assert_eq!(
            l.unit_file(&id()),
            PathBuf::from(
                "/etc/systemd/system/shoal-2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90@.service"
            )
        );
        assert_eq!(
            l.cluster_target_file(&id()),
            PathBuf::from("/etc/systemd/system/shoal-2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90.target")
        );
        assert_eq!(
            l.product_target_file(),
            PathBuf::from("/etc/systemd/system/shoal.target")
        );
    }
}
