use crate::config::RunConfig;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use shoaladm_runtime::init::query_unit;
use shoaladm_runtime::{container, keys, units, ContainerSpec, InitSystem};
use shoaladm_schema::{conf, ClusterId, DaemonKind, DaemonName};
use shoaladm_store::inventory::InstallStyle;
use shoaladm_store::{dirs, inventory, Ownership, StoreError, LOG_DIR_MODE};
use std::fs;
use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// The orchestrator. Holds the invocation's resolved configuration and an
/// injected init-system facade; everything else is read from disk per call.
pub struct Engine {
    pub(crate) config: RunConfig,
    init: Box<dyn InitSystem>,
}

/// Resolved config and keyring text for one daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub config: String,
    pub keyring: String,
}

#[derive(Debug, Clone)]
pub enum KeyringSource {
    File(PathBuf),
    /// A bare key; the keyring entry is synthesized for the daemon.
    Literal(String),
}

/// Where `deploy` gets its config and keyring from.
#[derive(Debug, Clone)]
pub enum CredSource {
    /// JSON envelope `{"config": ..., "keyring": ...}`; `None` reads stdin.
    Envelope(Option<PathBuf>),
    Files {
        config: PathBuf,
        keyring: KeyringSource,
    },
}

#[derive(Deserialize)]
struct Envelope {
    config: String,
    keyring: String,
}

impl CredSource {
    pub fn resolve(&self, entity: Option<&DaemonName>) -> Result<Credentials, CoreError> {
        match self {
            CredSource::Envelope(path) => {
                let text = match path {
                    Some(p) => fs::read_to_string(p)?,
                    None => {
                        let mut buf = String::new();
                        std::io::stdin().read_to_string(&mut buf)?;
                        buf
                    }
                };
                let envelope: Envelope = serde_json::from_str(&text)?;
                Ok(Credentials {
                    config: envelope.config,
                    keyring: envelope.keyring,
                })
            }
            CredSource::Files { config, keyring } => {
                let config = fs::read_to_string(config)?;
                let keyring = match keyring {
                    KeyringSource::File(p) => fs::read_to_string(p)?,
                    KeyringSource::Literal(key) => {
                        let entity = entity.ok_or(CoreError::MissingKeyring)?;
                        conf::keyring_entry(&entity.to_string(), key)
                    }
                };
                Ok(Credentials { config, keyring })
            }
        }
    }
}

/// One row of `ls` output: an on-disk daemon cross-referenced with the
/// init system.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonListing {
    pub style: String,
    pub name: String,
    pub cluster_id: String,
    pub enabled: bool,
    pub active: bool,
}

impl Engine {
    pub fn new(config: RunConfig, init: Box<dyn InitSystem>) -> Self {
        Self { config, init }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub(crate) fn init(&self) -> &dyn InitSystem {
        self.init.as_ref()
    }

    fn cluster_id_opt(&self) -> Result<Option<ClusterId>, CoreError> {
        Ok(self
            .config
            .cluster_id
            .as_deref()
            .map(ClusterId::parse)
            .transpose()?)
    }

    pub(crate) fn require_cluster_id(&self) -> Result<ClusterId, CoreError> {
        self.cluster_id_opt()?.ok_or(CoreError::MissingClusterId)
    }

    /// Explicit ownership, or whatever the image's daemon user is.
    pub(crate) fn owner(&self) -> Result<Ownership, CoreError> {
        match self.config.owner {
            Some(owner) => Ok(owner),
            None => Ok(keys::extract_ownership(&self.config.engine, &self.config.image)?),
        }
    }

    /// `shoal --version` inside a helper container.
    pub fn version(&self) -> Result<String, CoreError> {
        let mut spec = ContainerSpec::new(&self.config.image, "/usr/bin/shoal");
        spec.args = vec!["--version".to_owned()];
        Ok(keys::normalize_secret(&spec.run(&self.config.engine)?))
    }

    /// The long-running container a daemon instance executes as.
    pub(crate) fn daemon_container(
        &self,
        cluster_id: &ClusterId,
        name: &DaemonName,
    ) -> ContainerSpec {
        let mut spec = ContainerSpec::new(&self.config.image, name.kind.entrypoint());
        spec.args = vec!["-n".to_owned(), name.to_string(), "-f".to_owned()];
        spec.args
            .extend(container::daemon_args(cluster_id, name));
        if name.kind.privileged() {
            spec.engine_args.push("--privileged".to_owned());
        }
        spec.volumes = container::mounts_for(
            &self.config.layout,
            Some(cluster_id),
            name.kind,
            Some(&name.id),
        );
        spec.name = Some(container::container_name(cluster_id, name));
        spec
    }

    /// Write the `cmd` wrapper and install/start the daemon's unit.
    pub(crate) fn deploy_units(
        &self,
        cluster_id: &ClusterId,
        name: &DaemonName,
        spec: &ContainerSpec,
        start: bool,
    ) -> Result<(), CoreError> {
        let data_dir = self.config.layout.daemon_dir(cluster_id, name);
        dirs::write_cmd_script(&data_dir, &spec.run_argv(&self.config.engine))?;
        units::install_unit(
            &self.config.layout,
            self.init.as_ref(),
            cluster_id,
            name,
            &self.config.engine,
            start,
        )?;
        Ok(())
    }

    /// Create one daemon: directories, secrets, unit. Monitors get their
    /// on-disk store initialized first and must carry an address.
    pub fn deploy(
        &self,
        name: &DaemonName,
        creds: &CredSource,
        osd_fsid: Option<&str>,
    ) -> Result<(), CoreError> {
        let cluster_id = self.require_cluster_id()?;
        let mut credentials = creds.resolve(Some(name))?;
        if name.kind == DaemonKind::Mon {
            let addr = self
                .config
                .mon_addr
                .as_ref()
                .ok_or(CoreError::MissingMonAddress)?;
            credentials.config.push_str(&conf::mon_section(&name.id, addr));
        }
        let owner = self.owner()?;
        info!("deploying {name} into cluster {cluster_id}");

        if name.kind == DaemonKind::Mon {
            self.create_mon_store(&cluster_id, name, &credentials, owner)?;
        } else {
            let (data_dir, _) =
                dirs::ensure_daemon_dirs(&self.config.layout, &cluster_id, name, owner)?;
            dirs::write_secret(&data_dir, "config", &credentials.config, owner)?;
            dirs::write_secret(&data_dir, "keyring", &credentials.keyring, owner)?;
        }

        if name.kind == DaemonKind::Osd {
            if let Some(osd_fsid) = osd_fsid {
                self.activate_volume(&cluster_id, name, osd_fsid)?;
            }
        }

        let spec = self.daemon_container(&cluster_id, name);
        self.deploy_units(&cluster_id, name, &spec, true)
    }

    /// `shoal-mon --mkfs` against staged secrets, then persist the config
    /// into the monitor's directory.
    fn create_mon_store(
        &self,
        cluster_id: &ClusterId,
        name: &DaemonName,
        credentials: &Credentials,
        owner: Ownership,
    ) -> Result<(), CoreError> {
        let keyring_file = stage_secret(&credentials.keyring, owner)?;
        let config_file = stage_secret(&credentials.config, owner)?;
        let (data_dir, log_dir) =
            dirs::ensure_daemon_dirs(&self.config.layout, cluster_id, name, owner)?;

        let mut spec = ContainerSpec::new(&self.config.image, DaemonKind::Mon.entrypoint());
        spec.args = vec![
            "--mkfs".to_owned(),
            "-i".to_owned(),
            name.id.clone(),
            "--fsid".to_owned(),
            cluster_id.to_string(),
            "-c".to_owned(),
            "/tmp/config".to_owned(),
            "--keyring".to_owned(),
            "/tmp/keyring".to_owned(),
        ];
        spec.args.extend(container::daemon_args(cluster_id, name));
        spec.volumes = vec![
            (log_dir, "/var/log/shoal:z".to_owned()),
            (
                data_dir.clone(),
                format!("/var/lib/shoal/mon/shoal-{}:z", name.id),
            ),
            (keyring_file.path().to_path_buf(), "/tmp/keyring:z".to_owned()),
            (config_file.path().to_path_buf(), "/tmp/config:z".to_owned()),
        ];
        spec.run(&self.config.engine)?;

        dirs::write_secret(&data_dir, "config", &credentials.config, owner)?;
        Ok(())
    }

    /// Pre-activate an existing OSD volume before its unit starts.
    fn activate_volume(
        &self,
        cluster_id: &ClusterId,
        name: &DaemonName,
        osd_fsid: &str,
    ) -> Result<(), CoreError> {
        info!("activating volume {osd_fsid} for {name}");
        let mut spec = ContainerSpec::new(&self.config.image, "/usr/sbin/shoal-volume");
        spec.args = vec![
            "lvm".to_owned(),
            "activate".to_owned(),
            name.id.clone(),
            osd_fsid.to_owned(),
            "--no-systemd".to_owned(),
        ];
        spec.engine_args = vec!["--privileged".to_owned()];
        spec.volumes = container::mounts_for(
            &self.config.layout,
            Some(cluster_id),
            DaemonKind::Osd,
            Some(&name.id),
        );
        spec.name = Some(format!("shoal-{cluster_id}-activate-{name}"));
        spec.run(&self.config.engine)?;
        Ok(())
    }

    /// Run a daemon in the foreground without installing a unit (debug).
    pub fn run_foreground(&self, name: &DaemonName) -> Result<i32, CoreError> {
        let cluster_id = self.require_cluster_id()?;
        let spec = self.daemon_container(&cluster_id, name);
        spawn_foreground(&spec.run_argv(&self.config.engine))
    }

    /// Interactive container with a broad mount set.
    pub fn shell(
        &self,
        target: Option<&str>,
        config: Option<&Path>,
        keyring: Option<&Path>,
    ) -> Result<i32, CoreError> {
        let cluster_id = self.cluster_id_opt()?;
        let (kind, id) = match target {
            Some(t) if t.contains('.') => {
                let name: DaemonName = t.parse()?;
                (name.kind, Some(name.id))
            }
            Some(t) => (t.parse::<DaemonKind>()?, None),
            // OSDs carry the broadest mount set.
            None => (DaemonKind::Osd, None),
        };
        if let Some(cluster_id) = &cluster_id {
            let owner = self.config.owner.unwrap_or_else(Ownership::current);
            dirs::ensure_dir(&self.config.layout.log_dir(cluster_id), owner, LOG_DIR_MODE)?;
        }

        let mut spec = ContainerSpec::new(&self.config.image, "/bin/bash");
        spec.engine_args = vec!["--privileged".to_owned()];
        spec.volumes = container::mounts_for(
            &self.config.layout,
            cluster_id.as_ref(),
            kind,
            id.as_deref(),
        );
        if let Some(config) = config {
            spec.volumes
                .push((config.to_path_buf(), "/etc/shoal/shoal.conf:z".to_owned()));
        }
        if let Some(keyring) = keyring {
            spec.volumes.push((
                keyring.to_path_buf(),
                "/etc/shoal/shoal.keyring:z".to_owned(),
            ));
        }
        spawn_foreground(&spec.shell_argv(&self.config.engine))
    }

    /// Attach a shell inside an already-started daemon container.
    pub fn enter(&self, name: &DaemonName) -> Result<i32, CoreError> {
        self.exec_in(name, false, &["bash".to_owned()])
    }

    /// Run a command inside an already-started daemon container.
    pub fn exec_in(
        &self,
        name: &DaemonName,
        privileged: bool,
        command: &[String],
    ) -> Result<i32, CoreError> {
        let cluster_id = self.require_cluster_id()?;
        let cname = container::container_name(&cluster_id, name);
        spawn_foreground(&container::exec_argv(
            &self.config.engine,
            &cname,
            privileged,
            command,
        ))
    }

    /// Privileged `shoal-volume` helper for volume-group operations.
    pub fn volume_helper(
        &self,
        args: &[String],
        creds: Option<&CredSource>,
    ) -> Result<i32, CoreError> {
        let cluster_id = self.require_cluster_id()?;
        let owner = self.config.owner.unwrap_or_else(Ownership::current);
        dirs::ensure_dir(&self.config.layout.log_dir(&cluster_id), owner, LOG_DIR_MODE)?;

        let mut mounts = container::mounts_for(
            &self.config.layout,
            Some(&cluster_id),
            DaemonKind::Osd,
            None,
        );
        // Staged secrets must outlive the foreground run below.
        let mut staged = Vec::new();
        if let Some(creds) = creds {
            let credentials = creds.resolve(None)?;
            let config_file = stage_secret(&credentials.config, owner)?;
            let keyring_file = stage_secret(&credentials.keyring, owner)?;
            mounts.push((
                config_file.path().to_path_buf(),
                "/etc/shoal/shoal.conf:z".to_owned(),
            ));
            mounts.push((
                keyring_file.path().to_path_buf(),
                "/var/lib/shoal/bootstrap-osd/shoal.keyring:z".to_owned(),
            ));
            staged.push(config_file);
            staged.push(keyring_file);
        }

        let mut spec = ContainerSpec::new(&self.config.image, "/usr/sbin/shoal-volume");
        spec.args = args.to_vec();
        spec.engine_args = vec!["--privileged".to_owned()];
        spec.volumes = mounts;
        let code = spawn_foreground(&spec.run_argv(&self.config.engine))?;
        drop(staged);
        Ok(code)
    }

    /// Delegate one systemctl verb to the daemon's unit.
    pub fn unit_action(&self, name: &DaemonName, verb: &str) -> Result<(), CoreError> {
        let cluster_id = self.require_cluster_id()?;
        let unit = units::unit_name(&cluster_id, name);
        self.init.action(verb, &unit)?;
        Ok(())
    }

    /// Pure read: on-disk inventory cross-referenced with unit state.
    pub fn list(&self) -> Result<Vec<DaemonListing>, CoreError> {
        let mut listings = Vec::new();
        for found in inventory::scan(&self.config.layout)? {
            let (enabled, active) = query_unit(self.init.as_ref(), &found.unit_name());
            listings.push(DaemonListing {
                style: match &found.style {
                    InstallStyle::Managed => "managed".to_owned(),
                    InstallStyle::Legacy { .. } => "legacy".to_owned(),
                },
                name: found.name.to_string(),
                cluster_id: found
                    .cluster_id
                    .map_or_else(|| "unknown".to_owned(), ClusterId::into_inner),
                enabled,
                active,
            });
        }
        Ok(listings)
    }

    /// Stop, disable, and delete one daemon. Monitors and OSDs hold
    /// irreplaceable data and demand `--force`.
    pub fn remove_daemon(&self, name: &DaemonName, force: bool) -> Result<(), CoreError> {
        if name.kind.requires_force_removal() && !force {
            return Err(CoreError::ForceRequired { kind: name.kind });
        }
        let cluster_id = self.require_cluster_id()?;
        let unit = units::unit_name(&cluster_id, name);
        units::remove_daemon_unit(self.init.as_ref(), &unit)?;

        let data_dir = self.config.layout.daemon_dir(&cluster_id, name);
        if data_dir.exists() {
            fs::remove_dir_all(&data_dir).map_err(path_io(&data_dir))?;
        }
        info!("removed {name} from cluster {cluster_id}");
        Ok(())
    }

    /// Remove every trace of one cluster identity: units, data, logs.
    pub fn remove_cluster(&self, force: bool) -> Result<(), CoreError> {
        if !force {
            return Err(CoreError::ClusterForceRequired);
        }
        let cluster_id = self.require_cluster_id()?;
        units::remove_cluster_units(&self.config.layout, self.init.as_ref(), &cluster_id)?;

        for tree in [
            self.config.layout.cluster_dir(&cluster_id),
            self.config.layout.log_dir(&cluster_id),
        ] {
            if tree.exists() {
                fs::remove_dir_all(&tree).map_err(path_io(&tree))?;
            }
        }
        info!("removed cluster {cluster_id}");
        Ok(())
    }
}

/// Stage secret text in a 0600 temp file for bind-mounting into a helper.
pub(crate) fn stage_secret(
    contents: &str,
    owner: Ownership,
) -> Result<tempfile::NamedTempFile, CoreError> {
    let file = tempfile::NamedTempFile::new()?;
    std::os::unix::fs::chown(file.path(), Some(owner.uid), Some(owner.gid))?;
    let mut handle = file.as_file();
    handle.write_all(contents.as_bytes())?;
    handle.flush()?;
    Ok(file)
}

pub(crate) fn spawn_foreground(argv: &[String]) -> Result<i32, CoreError> {
    debug!("spawning: {}", argv.join(" "));
    let status = Command::new(&argv[0]).args(&argv[1..]).status()?;
    Ok(status.code().unwrap_or(1))
}

pub(crate) fn path_io(path: &Path) -> impl FnOnce(std::io::Error) -> CoreError + '_ {
    move |source| {
        StoreError::PathIo {
            path: path.to_path_buf(),
            source,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_credentials_resolve_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bundle.json");
        fs::write(
            &path,
            r#"{"config": "[global]\n", "keyring": "[mds.a]\n\tkey = K==\n"}"#,
        )
        .unwrap();

        let creds = CredSource::Envelope(Some(path))
            .resolve(Some(&"mds.a".parse().unwrap()))
            .unwrap();
        assert_eq!(creds.config, "[global]\n");
        assert!(creds.keyring.contains("mds.a"));
    }

    #[test]
    fn malformed_envelope_is_a_serialization_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bundle.json");
        fs::write(&path, "{\"config\": 1}").unwrap();
        let err = CredSource::Envelope(Some(path)).resolve(None).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn literal_key_synthesizes_a_keyring_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("shoal.conf");
        fs::write(&config_path, "[global]\n").unwrap();

        let source = CredSource::Files {
            config: config_path,
            keyring: KeyringSource::Literal("SECRET==".to_owned()),
        };
        let creds = source.resolve(Some(&"rgw.gw1".parse().unwrap())).unwrap();
        assert_eq!(creds.keyring, "[rgw.gw1]\n\tkey = SECRET==\n");
    }

    #[test]
    fn literal_key_without_an_entity_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("shoal.conf");
        fs::write(&config_path, "[global]\n").unwrap();

        let source = CredSource::Files {
            config: config_path,
            keyring: KeyringSource::Literal("SECRET==".to_owned()),
        };
        assert!(matches!(
            source.resolve(None),
            Err(CoreError::MissingKeyring)
        ));
    }

    #[test]
    fn staged_secrets_are_owner_only() {
        use std::os::unix::fs::MetadataExt;
        let staged = stage_secret("[mon.]\n", Ownership::current()).unwrap();
        let mode = fs::metadata(staged.path()).unwrap().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(staged.path()).unwrap(), "[mon.]\n");
    }
}
