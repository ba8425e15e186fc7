//! Full cluster bootstrap: keys, monmap, monitor store, monitor and
//! manager units, readiness wait, and optional ssh orchestration setup.
//!
//! Every step is idempotent or strictly ordered after the previous one, so
//! a failed bootstrap can be re-run after fixing the cause.

use crate::concurrency::shutdown_requested;
use crate::engine::{path_io, stage_secret};
use crate::{CoreError, Engine};
use shoaladm_runtime::{container, keys, ContainerSpec};
use shoaladm_schema::{conf, identity, ClusterIdentity, DaemonKind, DaemonName};
use shoaladm_store::{dirs, Ownership};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl Engine {
    /// Bring up a brand-new single-host cluster: one monitor, one manager.
    ///
    /// Returns the resolved identity on success. On failure the on-disk
    /// state is left exactly where the failing step stopped.
    #[allow(clippy::too_many_lines)]
    pub fn bootstrap(&self) -> Result<ClusterIdentity, CoreError> {
        let identity = ClusterIdentity::resolve(
            self.config.image.clone(),
            self.config.cluster_id.as_deref(),
            self.config.mon_id.as_deref(),
            self.config.mgr_id.as_deref(),
        )?;
        let cluster_id = identity.cluster_id.clone();
        info!("cluster id: {cluster_id}");

        let addr = self
            .config
            .mon_addr
            .as_ref()
            .ok_or(CoreError::MissingMonAddress)?;
        let owner = self.owner()?;
        let engine = &self.config.engine;
        let image = &self.config.image;

        let keyset = keys::initial_keys(engine, image)?;
        let config_text = conf::render_cluster_conf(&cluster_id, addr.mon_host_value());

        info!("creating initial monmap");
        let scratch = tempfile::tempdir()?;
        let monmap_path = scratch.path().join("monmap");
        keys::write_monmap(
            engine,
            image,
            &cluster_id,
            &identity.mon_id,
            addr.mon_host_value(),
            &monmap_path,
        )?;

        info!("creating mon");
        let mon_name = DaemonName::new(DaemonKind::Mon, identity.mon_id.clone());
        let (mon_dir, log_dir) =
            dirs::ensure_daemon_dirs(&self.config.layout, &cluster_id, &mon_name, owner)?;
        let keyring_file = stage_secret(&keyset.bootstrap_keyring, owner)?;

        let mut mkfs = ContainerSpec::new(image, DaemonKind::Mon.entrypoint());
        mkfs.args = vec![
            "--mkfs".to_owned(),
            "-i".to_owned(),
            identity.mon_id.clone(),
            "--fsid".to_owned(),
            cluster_id.to_string(),
            "-c".to_owned(),
            "/dev/null".to_owned(),
            "--monmap".to_owned(),
            "/tmp/monmap".to_owned(),
            "--keyring".to_owned(),
            "/tmp/keyring".to_owned(),
        ];
        mkfs.args
            .extend(container::daemon_args(&cluster_id, &mon_name));
        mkfs.volumes = vec![
            (log_dir, "/var/log/shoal:z".to_owned()),
            (
                mon_dir.clone(),
                format!("/var/lib/shoal/mon/shoal-{}:z", identity.mon_id),
            ),
            (keyring_file.path().to_path_buf(), "/tmp/keyring:z".to_owned()),
            (monmap_path, "/tmp/monmap:z".to_owned()),
        ];
        mkfs.run(engine)?;

        dirs::write_secret(&mon_dir, "config", &config_text, owner)?;

        let mon_spec = self.daemon_container(&cluster_id, &mon_name);
        self.deploy_units(&cluster_id, &mon_name, &mon_spec, true)?;

        info!("creating mgr");
        let mgr_name = DaemonName::new(DaemonKind::Mgr, identity.mgr_id.clone());
        let (mgr_dir, _) =
            dirs::ensure_daemon_dirs(&self.config.layout, &cluster_id, &mgr_name, owner)?;
        dirs::write_secret(&mgr_dir, "config", &config_text, owner)?;
        dirs::write_secret(
            &mgr_dir,
            "keyring",
            &keyset.mgr_keyring(&identity.mgr_id),
            owner,
        )?;
        let mgr_spec = self.daemon_container(&cluster_id, &mgr_name);
        self.deploy_units(&cluster_id, &mgr_name, &mgr_spec, true)?;

        if let Some(path) = &self.config.output_keyring {
            write_restricted(path, &keyset.admin_keyring())?;
            info!("wrote admin keyring to {}", path.display());
        }
        if let Some(path) = &self.config.output_config {
            std::fs::write(path, &config_text).map_err(path_io(path))?;
            info!("wrote config to {}", path.display());
        }

        self.wait_for_mgr(&identity.mon_id, &mon_dir)?;

        if self.config.skip_ssh {
            info!("skipping ssh orchestration setup");
        } else {
            self.setup_ssh(&identity, &mon_dir)?;
        }

        Ok(identity)
    }

    /// Poll cluster status until the manager reports available, up to the
    /// configured attempt ceiling.
    fn wait_for_mgr(&self, mon_id: &str, mon_dir: &Path) -> Result<(), CoreError> {
        info!("waiting for mgr to become available");
        for attempt in 1..=self.config.wait_attempts {
            if shutdown_requested() {
                return Err(CoreError::Interrupted);
            }
            let out = self.mon_cli(mon_id, mon_dir, &["status", "--format", "json"], &[])?;
            let status: serde_json::Value = serde_json::from_str(&out).map_err(|_| {
                CoreError::UnexpectedStatus(out.chars().take(200).collect())
            })?;
            let available = status
                .get("mgrmap")
                .and_then(|m| m.get("available"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            if available {
                info!("mgr is available");
                return Ok(());
            }
            debug!("mgr not available yet (attempt {attempt})");
            std::thread::sleep(self.config.wait_interval);
        }
        Err(CoreError::ReadinessTimeout {
            attempts: self.config.wait_attempts,
        })
    }

    /// Register the orchestration ssh identity and this host with the
    /// freshly bootstrapped cluster.
    fn setup_ssh(&self, identity: &ClusterIdentity, mon_dir: &Path) -> Result<(), CoreError> {
        info!("generating ssh orchestration identity");
        let (secret, public) = keys::gen_ssh_identity(&identity.cluster_id)?;
        let secret_file = stage_secret(&format!("{secret}\n"), Ownership::current())?;
        let public_file = stage_secret(&format!("{public}\n"), Ownership::current())?;

        if let Some(path) = &self.config.output_pub_ssh_key {
            std::fs::write(path, format!("{public}\n")).map_err(path_io(path))?;
            info!("wrote public ssh key to {}", path.display());
        }

        let mon_id = &identity.mon_id;
        self.mon_cli(
            mon_id,
            mon_dir,
            &["config-key", "set", "mgr/ssh/ssh_identity_key", "-i", "/tmp/identity"],
            &[(
                secret_file.path().to_path_buf(),
                "/tmp/identity:z".to_owned(),
            )],
        )?;
        self.mon_cli(
            mon_id,
            mon_dir,
            &["config-key", "set", "mgr/ssh/ssh_identity_pub", "-i", "/tmp/identity.pub"],
            &[(
                public_file.path().to_path_buf(),
                "/tmp/identity.pub:z".to_owned(),
            )],
        )?;

        info!("authorizing the key for root@localhost");
        append_authorized_key(Path::new("/root/.ssh/authorized_keys"), &public)?;

        info!("enabling the ssh orchestration module");
        self.mon_cli(mon_id, mon_dir, &["mgr", "module", "enable", "ssh"], &[])?;
        self.mon_cli(mon_id, mon_dir, &["orchestrator", "set", "backend", "ssh"], &[])?;

        let host = identity::local_hostname();
        info!("registering host {host}");
        self.mon_cli(mon_id, mon_dir, &["orchestrator", "host", "add", &host], &[])?;
        Ok(())
    }

    /// Run the cluster CLI in a helper container, authenticated as the
    /// monitor, against the monitor's own keyring and config.
    fn mon_cli(
        &self,
        mon_id: &str,
        mon_dir: &Path,
        args: &[&str],
        extra_mounts: &[(PathBuf, String)],
    ) -> Result<String, CoreError> {
        let mut spec = ContainerSpec::new(&self.config.image, "/usr/bin/shoal");
        spec.args = vec![
            "-n".to_owned(),
            "mon.".to_owned(),
            "-k".to_owned(),
            format!("/var/lib/shoal/mon/shoal-{mon_id}/keyring"),
            "-c".to_owned(),
            format!("/var/lib/shoal/mon/shoal-{mon_id}/config"),
        ];
        spec.args.extend(args.iter().map(|a| (*a).to_owned()));
        spec.volumes = vec![(
            mon_dir.to_path_buf(),
            format!("/var/lib/shoal/mon/shoal-{mon_id}:z"),
        )];
        spec.volumes.extend(extra_mounts.iter().cloned());
        Ok(spec.run(&self.config.engine)?)
    }
}

fn write_restricted(path: &Path, contents: &str) -> Result<(), CoreError> {
    let mut f = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(path_io(path))?;
    f.write_all(contents.as_bytes()).map_err(path_io(path))?;
    Ok(())
}

fn append_authorized_key(path: &Path, public: &str) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(path_io(parent))?;
    }
    let mut f = OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(path)
        .map_err(path_io(path))?;
    writeln!(f, "{public}").map_err(path_io(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;

    #[test]
    fn restricted_writes_are_owner_only() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("admin.keyring");
        write_restricted(&path, "[client.admin]\n\tkey = A==\n").unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().mode() & 0o777,
            0o600
        );
    }

    #[test]
    fn authorized_key_appends_without_clobbering() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".ssh").join("authorized_keys");
        append_authorized_key(&path, "ssh-ed25519 AAAA one").unwrap();
        append_authorized_key(&path, "ssh-ed25519 BBBB two").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("AAAA"));
        assert!(text.contains("BBBB"));
        assert_eq!(std::fs::metadata(&path).unwrap().mode() & 0o777, 0o600);
    }
}
