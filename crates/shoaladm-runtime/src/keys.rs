//! Key material generation and extraction.
//!
//! Every key, keyring, and membership map comes out of a short-lived helper
//! container (or `ssh-keygen` for the orchestration identity) with its
//! stdout captured. Each function spawns at most one container per call and
//! must be invoked at most once per logical step to avoid key churn. All
//! captured secret output passes through the same [`normalize_secret`]
//! step.

use crate::container::ContainerSpec;
use crate::RuntimeError;
use shoaladm_schema::{conf, ClusterId};
use shoaladm_store::Ownership;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Canonical cleanup for captured secret/byte-blob output: strip
/// surrounding whitespace, keep interior structure.
pub fn normalize_secret(raw: &str) -> String {
    raw.trim().to_owned()
}

/// The keys minted during bootstrap.
#[derive(Debug, Clone)]
pub struct KeySet {
    pub mon_key: String,
    pub admin_key: String,
    pub mgr_key: String,
    /// Monitor + administrator keyring fed to `shoal-mon --mkfs`.
    pub bootstrap_keyring: String,
}

impl KeySet {
    pub fn admin_keyring(&self) -> String {
        conf::keyring_entry("client.admin", &self.admin_key)
    }

    pub fn mgr_keyring(&self, mgr_id: &str) -> String {
        conf::mgr_keyring(mgr_id, &self.mgr_key)
    }
}

/// Mint one fresh key with the in-image key tool.
pub fn create_key(engine: &Path, image: &str) -> Result<String, RuntimeError> {
    let mut spec = ContainerSpec::new(image, "/usr/bin/shoal-authtool");
    spec.args = vec!["--gen-print-key".to_owned()];
    let key = normalize_secret(&spec.run(engine)?);
    if key.is_empty() {
        return Err(RuntimeError::UnexpectedOutput(
            "shoal-authtool produced no key".to_owned(),
        ));
    }
    Ok(key)
}

/// Mint the monitor, administrator, and manager keys for a brand-new
/// cluster and compose the bootstrap keyring.
pub fn initial_keys(engine: &Path, image: &str) -> Result<KeySet, RuntimeError> {
    info!("creating initial keys");
    let mon_key = create_key(engine, image)?;
    let admin_key = create_key(engine, image)?;
    let mgr_key = create_key(engine, image)?;
    let bootstrap_keyring = conf::bootstrap_keyring(&mon_key, &admin_key);
    Ok(KeySet {
        mon_key,
        admin_key,
        mgr_key,
        bootstrap_keyring,
    })
}

/// Fetch the monitor keyring from an already-running cluster, for a new
/// monitor joining an existing quorum.
pub fn extract_keyring(
    engine: &Path,
    image: &str,
    scratch: &Path,
) -> Result<PathBuf, RuntimeError> {
    let mut spec = ContainerSpec::new(image, "/usr/bin/shoal");
    spec.args = vec![
        "auth".to_owned(),
        "get".to_owned(),
        "mon.".to_owned(),
        "-o".to_owned(),
        "/var/lib/shoal/tmp/keyring".to_owned(),
    ];
    spec.volumes = vec![
        (scratch.to_path_buf(), "/var/lib/shoal/tmp:z".to_owned()),
        (PathBuf::from("/etc/shoal"), "/etc/shoal:z".to_owned()),
    ];
    spec.run(engine)?;
    Ok(scratch.join("keyring"))
}

/// Fetch the current monitor membership map from a running cluster.
pub fn extract_monmap(engine: &Path, image: &str, scratch: &Path) -> Result<PathBuf, RuntimeError> {
    let mut spec = ContainerSpec::new(image, "/usr/bin/shoal");
    spec.args = vec![
        "mon".to_owned(),
        "getmap".to_owned(),
        "-o".to_owned(),
        "/var/lib/shoal/tmp/monmap".to_owned(),
    ];
    spec.volumes = vec![
        (scratch.to_path_buf(), "/var/lib/shoal/tmp:z".to_owned()),
        (PathBuf::from("/etc/shoal"), "/etc/shoal:z".to_owned()),
    ];
    spec.run(engine)?;
    Ok(scratch.join("monmap"))
}

/// Build the single-monitor membership map for a new cluster at `dest`.
pub fn write_monmap(
    engine: &Path,
    image: &str,
    cluster_id: &ClusterId,
    mon_id: &str,
    addr: &str,
    dest: &Path,
) -> Result<(), RuntimeError> {
    // The bind mount needs an existing file on the host side.
    std::fs::File::create(dest)?;
    let mut spec = ContainerSpec::new(image, "/usr/bin/shoal-monmaptool");
    spec.args = vec![
        "--create".to_owned(),
        "--clobber".to_owned(),
        "--fsid".to_owned(),
        cluster_id.to_string(),
        "--addv".to_owned(),
        mon_id.to_owned(),
        addr.to_owned(),
        "/tmp/monmap".to_owned(),
    ];
    spec.volumes = vec![(dest.to_path_buf(), "/tmp/monmap:z".to_owned())];
    spec.run(engine)?;
    Ok(())
}

/// Generate the orchestration SSH identity. Returns `(secret, public)`;
/// the on-disk staging files are removed with the temp dir.
pub fn gen_ssh_identity(cluster_id: &ClusterId) -> Result<(String, String), RuntimeError> {
    let dir = tempfile::tempdir()?;
    let key_path = dir.path().join("key");
    let output = Command::new("ssh-keygen")
        .arg("-C")
        .arg(format!("shoal-{cluster_id}"))
        .arg("-N")
        .arg("")
        .arg("-q")
        .arg("-f")
        .arg(&key_path)
        .output()?;
    if !output.status.success() {
        return Err(RuntimeError::Helper {
            entrypoint: "ssh-keygen".to_owned(),
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    let secret = normalize_secret(&std::fs::read_to_string(&key_path)?);
    let public = normalize_secret(&std::fs::read_to_string(
        key_path.with_extension("pub"),
    )?);
    Ok((secret, public))
}

/// Learn the daemon uid/gid baked into the image by statting its state
/// directory from inside a helper container.
pub fn extract_ownership(engine: &Path, image: &str) -> Result<Ownership, RuntimeError> {
    let mut spec = ContainerSpec::new(image, "stat");
    spec.args = vec![
        "-c".to_owned(),
        "%u %g".to_owned(),
        "/var/lib/shoal".to_owned(),
    ];
    let out = spec.run(engine)?;
    parse_ownership(&out)
}

fn parse_ownership(out: &str) -> Result<Ownership, RuntimeError> {
    let cleaned = normalize_secret(out);
    let mut parts = cleaned.split_whitespace();
    let uid = parts.next().and_then(|p| p.parse::<u32>().ok());
    let gid = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (uid, gid) {
        (Some(uid), Some(gid)) => Ok(Ownership::new(uid, gid)),
        _ => Err(RuntimeError::UnexpectedOutput(format!(
            "expected 'uid gid', got '{cleaned}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_surrounding_whitespace_only() {
        assert_eq!(normalize_secret("AQD3yz9hA==\n"), "AQD3yz9hA==");
        assert_eq!(normalize_secret("  key \n\n"), "key");
        assert_eq!(normalize_secret("line1\nline2\n"), "line1\nline2");
    }

    #[test]
    fn keyset_renders_scoped_keyrings() {
        let keys = KeySet {
            mon_key: "M==".to_owned(),
            admin_key: "A==".to_owned(),
            mgr_key: "G==".to_owned(),
            bootstrap_keyring: conf::bootstrap_keyring("M==", "A=="),
        };
        assert!(keys.admin_keyring().contains("[client.admin]"));
        assert!(keys.mgr_keyring("host1").contains("[mgr.host1]"));
        assert!(keys.bootstrap_keyring.contains("key = M=="));
    }

    #[test]
    fn ownership_parsing() {
        assert_eq!(parse_ownership("167 167\n").unwrap(), Ownership::new(167, 167));
        assert_eq!(parse_ownership(" 0 0 ").unwrap(), Ownership::new(0, 0));
        assert!(parse_ownership("").is_err());
        assert!(parse_ownership("x y").is_err());
    }

    #[test]
    fn failed_helper_surfaces_as_error() {
        // `false` stands in for an engine whose run exits non-zero.
        let err = create_key(Path::new("false"), "img").unwrap_err();
        assert!(matches!(err, RuntimeError::Helper { .. }));
    }

    #[test]
    fn empty_key_output_is_rejected() {
        // `true` exits 0 with no output: the helper "succeeded" but
        // produced no key material.
        let err = create_key(Path::new("true"), "img").unwrap_err();
        assert!(matches!(err, RuntimeError::UnexpectedOutput(_)));
    }

    #[test]
    fn extraction_outputs_land_in_the_scratch_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let keyring = extract_keyring(Path::new("true"), "img", tmp.path()).unwrap();
        assert_eq!(keyring, tmp.path().join("keyring"));
        let monmap = extract_monmap(Path::new("true"), "img", tmp.path()).unwrap();
        assert_eq!(monmap, tmp.path().join("monmap"));
    }

    #[test]
    fn monmap_destination_is_created_for_the_bind_mount() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("monmap");
        let id = ClusterId::parse("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90").unwrap();
        write_monmap(Path::new("true"), "img", &id, "a", "10.0.0.5", &dest).unwrap();
        assert!(dest.is_file());
    }
}
