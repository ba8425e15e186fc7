//! Minimal INI-shaped cluster config and keyring texts.
//!
//! The daemons only need `fsid` and `mon host` to find their cluster, and
//! keyrings are `[entity]` sections with a `key =` line plus capability
//! lines. Rendering is deliberately plain string building; parsing covers
//! just enough INI to recover `fsid` from a legacy config file.

use crate::types::ClusterId;

/// How a monitor is reachable: a fixed address, a public network to bind
/// within, or an explicit address vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonAddr {
    Addr(String),
    Network(String),
    Addrv(String),
}

impl MonAddr {
    /// The value placed in the `mon host` line of the cluster config.
    pub fn mon_host_value(&self) -> &str {
        match self {
            MonAddr::Addr(v) | MonAddr::Network(v) | MonAddr::Addrv(v) => v,
        }
    }
}

/// Initial cluster config written during bootstrap and handed to every
/// deployed daemon.
pub fn render_cluster_conf(cluster_id: &ClusterId, mon_host: &str) -> String {
    format!("[global]\n\tfsid = {cluster_id}\n\tmon host = {mon_host}\n")
}

/// Per-monitor address section appended to the config for `deploy mon.<id>`.
pub fn mon_section(mon_id: &str, addr: &MonAddr) -> String {
    match addr {
        MonAddr::Addr(ip) | MonAddr::Addrv(ip) => {
            format!("[mon.{mon_id}]\n\tpublic_addr = {ip}\n")
        }
        MonAddr::Network(net) => format!("[mon.{mon_id}]\n\tpublic_network = {net}\n"),
    }
}

/// A bare keyring entry: named key, no capabilities.
pub fn keyring_entry(entity: &str, key: &str) -> String {
    format!("[{entity}]\n\tkey = {key}\n")
}

/// The bootstrap keyring fed to `shoal-mon --mkfs`: the monitor key plus
/// the administrator key with full capabilities.
pub fn bootstrap_keyring(mon_key: &str, admin_key: &str) -> String {
    format!(
        "[mon.]\n\
         \tkey = {mon_key}\n\
         \tcaps mon = allow *\n\
         [client.admin]\n\
         \tkey = {admin_key}\n\
         \tcaps mon = allow *\n\
         \tcaps osd = allow *\n\
         \tcaps mds = allow *\n\
         \tcaps mgr = allow *\n"
    )
}

/// Keyring for the manager daemon created during bootstrap.
pub fn mgr_keyring(mgr_id: &str, mgr_key: &str) -> String {
    format!(
        "[mgr.{mgr_id}]\n\
         \tkey = {mgr_key}\n\
         \tcaps mon = allow profile mgr\n\
         \tcaps osd = allow *\n\
         \tcaps mds = allow *\n"
    )
}

/// Recover the cluster id from the `[global]` section of a legacy config
/// file. Returns `None` when the section or key is missing or the value is
/// not UUID-shaped; the caller decides whether that is fatal.
pub fn parse_global_fsid(text: &str) -> Option<ClusterId> {
    let mut in_global = false;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_global = section.trim() == "global";
            continue;
        }
        if !in_global {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "fsid" {
                let value = value.trim();
                return ClusterId::parse(value).ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ClusterId {
        ClusterId::parse("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90").unwrap()
    }

    #[test]
    fn cluster_conf_has_fsid_and_mon_host() {
        let conf = render_cluster_conf(&id(), "10.0.0.5");
        assert!(conf.starts_with("[global]\n"));
        assert!(conf.contains("fsid = 2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90"));
        assert!(conf.contains("mon host = 10.0.0.5"));
    }

    #[test]
    fn mon_section_uses_addr_or_network() {
        let by_ip = mon_section("a", &MonAddr::Addr("10.0.0.5".to_owned()));
        assert!(by_ip.contains("[mon.a]"));
        assert!(by_ip.contains("public_addr = 10.0.0.5"));

        let by_net = mon_section("a", &MonAddr::Network("10.0.0.0/24".to_owned()));
        assert!(by_net.contains("public_network = 10.0.0.0/24"));
    }

    #[test]
    fn bootstrap_keyring_grants_admin_full_caps() {
        let kr = bootstrap_keyring("MONKEY==", "ADMINKEY==");
        assert!(kr.contains("[mon.]"));
        assert!(kr.contains("key = MONKEY=="));
        assert!(kr.contains("[client.admin]"));
        assert!(kr.contains("key = ADMINKEY=="));
        assert!(kr.contains("caps mgr = allow *"));
    }

    #[test]
    fn mgr_keyring_is_scoped_to_the_instance() {
        let kr = mgr_keyring("host1", "K==");
        assert!(kr.contains("[mgr.host1]"));
        assert!(kr.contains("caps mon = allow profile mgr"));
    }

    #[test]
    fn fsid_recovered_from_global_section() {
        let text = "# cluster config\n[global]\nfsid = 2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90\nmon host = 10.0.0.5\n";
        assert_eq!(parse_global_fsid(text), Some(id()));
    }

    #[test]
    fn fsid_outside_global_is_ignored() {
        let text = "[mon.a]\nfsid = 2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90\n";
        assert_eq!(parse_global_fsid(text), None);
    }

    #[test]
    fn missing_or_malformed_fsid_is_none() {
        assert_eq!(parse_global_fsid(""), None);
        assert_eq!(parse_global_fsid("[global]\nfsid = bogus\n"), None);
        assert_eq!(parse_global_fsid("[global]\nmon host = 10.0.0.5\n"), None);
    }

    #[test]
    fn rendering_is_deterministic() {
        let a = render_cluster_conf(&id(), "10.0.0.5");
        let b = render_cluster_conf(&id(), "10.0.0.5");
        assert_eq!(a, b);
    }
}
