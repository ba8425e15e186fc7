//! One-pass discovery of daemon installations on this host.
//!
//! The data root can hold two coexisting layouts: managed directories named
//! by cluster id with `<kind>.<id>` children, and legacy directories named
//! by daemon kind with `<cluster>-<id>` children. The scan tags each find
//! with its [`InstallStyle`] so callers never re-derive the distinction.

use crate::layout::StoreLayout;
use crate::{at, StoreError};
use serde::Serialize;
use shoaladm_schema::{conf, ClusterId, DaemonKind, DaemonName};
use std::fs;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum InstallStyle {
    /// Containerized layout managed by this tool.
    Managed,
    /// Pre-container package installation, named by its cluster label.
    Legacy { cluster: String },
}

/// A daemon found on disk, before any init-system cross-referencing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDaemon {
    #[serde(flatten)]
    pub style: InstallStyle,
    pub name: DaemonName,
    /// `None` when no identity could be recovered for a legacy daemon.
    pub cluster_id: Option<ClusterId>,
}

impl DiscoveredDaemon {
    /// The systemd unit this daemon would run under.
    pub fn unit_name(&self) -> String {
        match &self.style {
            InstallStyle::Managed => {
                let id = self.cluster_id.as_ref().map_or("unknown", |c| c.as_str());
                format!("shoal-{id}@{}.service", self.name)
            }
            InstallStyle::Legacy { .. } => {
                format!("shoal-{}@{}.service", self.name.kind, self.name.id)
            }
        }
    }
}

/// Enumerate every daemon directory under the data root, legacy and managed.
///
/// An absent data root is an empty inventory, not an error. Entries that
/// match neither layout shape are skipped.
pub fn scan(layout: &StoreLayout) -> Result<Vec<DiscoveredDaemon>, StoreError> {
    let mut found = Vec::new();
    let data_root = layout.data_root();
    if !data_root.exists() {
        return Ok(found);
    }

    for top in sorted_dir_names(data_root)? {
        if let Ok(kind) = top.parse::<DaemonKind>() {
            for child in sorted_dir_names(&layout.legacy_kind_dir(kind))? {
                let Some((cluster, id)) = child.split_once('-') else {
                    continue;
                };
                let fsid = legacy_cluster_fsid(layout, kind, cluster, id);
                found.push(DiscoveredDaemon {
                    style: InstallStyle::Legacy {
                        cluster: cluster.to_owned(),
                    },
                    name: DaemonName::new(kind, id),
                    cluster_id: fsid,
                });
            }
        } else if ClusterId::is_valid(&top) {
            let cluster_id = ClusterId::new(top);
            for child in sorted_dir_names(&layout.cluster_dir(&cluster_id))? {
                let Ok(name) = child.parse::<DaemonName>() else {
                    debug!("skipping unrecognized entry {child}");
                    continue;
                };
                found.push(DiscoveredDaemon {
                    style: InstallStyle::Managed,
                    name,
                    cluster_id: Some(cluster_id.clone()),
                });
            }
        }
    }
    Ok(found)
}

/// Recover the cluster id of a legacy daemon.
///
/// OSDs record it in a `cluster_fsid` file beside their data; every kind
/// can fall back to the `[global]` section of the legacy cluster config.
pub fn legacy_cluster_fsid(
    layout: &StoreLayout,
    kind: DaemonKind,
    cluster: &str,
    id: &str,
) -> Option<ClusterId> {
    if kind == DaemonKind::Osd {
        let marker = layout.legacy_daemon_dir(kind, cluster, id).join("cluster_fsid");
        if let Ok(text) = fs::read_to_string(&marker) {
            if let Ok(fsid) = ClusterId::parse(text.trim()) {
                return Some(fsid);
            }
        }
    }
    let conf_path = layout.legacy_conf_file(cluster);
    let text = fs::read_to_string(&conf_path).ok()?;
    conf::parse_global_fsid(&text)
}

fn sorted_dir_names(dir: &std::path::Path) -> Result<Vec<String>, StoreError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(at(dir))? {
        let entry = entry.map_err(at(dir))?;
        if entry.file_type().map_err(at(dir))?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const FSID: &str = "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90";

    fn test_layout(dir: &Path) -> StoreLayout {
        StoreLayout::new(dir.join("data"), dir.join("log"), dir.join("units"))
            .with_conf_root(dir.join("etc"))
    }

    #[test]
    fn empty_data_root_is_empty_inventory() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        assert!(scan(&layout).unwrap().is_empty());
    }

    #[test]
    fn managed_daemons_are_discovered_with_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        fs::create_dir_all(tmp.path().join("data").join(FSID).join("mon.a")).unwrap();
        fs::create_dir_all(tmp.path().join("data").join(FSID).join("mgr.a")).unwrap();

        let found = scan(&layout).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|d| d.style == InstallStyle::Managed
                && d.cluster_id.as_deref() == Some(FSID)));
        assert!(found.iter().any(|d| d.name.to_string() == "mon.a"));
    }

    #[test]
    fn legacy_daemons_are_discovered_with_cluster_label() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        fs::create_dir_all(tmp.path().join("data").join("osd").join("shoal-3")).unwrap();

        let found = scan(&layout).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].style,
            InstallStyle::Legacy {
                cluster: "shoal".to_owned()
            }
        );
        assert_eq!(found[0].name.to_string(), "osd.3");
        // No config anywhere: identity is unrecoverable, not an error.
        assert_eq!(found[0].cluster_id, None);
    }

    #[test]
    fn legacy_osd_fsid_comes_from_marker_file_first() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        let osd_dir = tmp.path().join("data").join("osd").join("shoal-3");
        fs::create_dir_all(&osd_dir).unwrap();
        fs::write(osd_dir.join("cluster_fsid"), format!("{FSID}\n")).unwrap();

        let fsid = legacy_cluster_fsid(&layout, DaemonKind::Osd, "shoal", "3").unwrap();
        assert_eq!(fsid.as_str(), FSID);
    }

    #[test]
    fn legacy_fsid_falls_back_to_cluster_conf() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        fs::create_dir_all(tmp.path().join("etc")).unwrap();
        fs::write(
            tmp.path().join("etc").join("shoal.conf"),
            format!("[global]\nfsid = {FSID}\n"),
        )
        .unwrap();

        let fsid = legacy_cluster_fsid(&layout, DaemonKind::Mon, "shoal", "a").unwrap();
        assert_eq!(fsid.as_str(), FSID);
    }

    #[test]
    fn entries_without_separator_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = test_layout(tmp.path());
        fs::create_dir_all(tmp.path().join("data").join("mon").join("noseparator")).unwrap();
        fs::create_dir_all(tmp.path().join("data").join("randomdir")).unwrap();

        assert!(scan(&layout).unwrap().is_empty());
    }

    #[test]
    fn unit_names_differ_by_style() {
        let managed = DiscoveredDaemon {
            style: InstallStyle::Managed,
            name: "mon.a".parse().unwrap(),
            cluster_id: Some(ClusterId::parse(FSID).unwrap()),
        };
        assert_eq!(managed.unit_name(), format!("shoal-{FSID}@mon.a.service"));

        let legacy = DiscoveredDaemon {
            style: InstallStyle::Legacy {
                cluster: "shoal".to_owned(),
            },
            name: "osd.3".parse().unwrap(),
            cluster_id: None,
        };
        assert_eq!(legacy.unit_name(), "shoal-osd@3.service");
    }
}
