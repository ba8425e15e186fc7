use crate::RuntimeError;
use std::path::{Path, PathBuf};

/// podman first, docker as the fallback.
const ENGINE_PREFERENCE: [&str; 2] = ["podman", "docker"];

/// Locate the container engine binary on `PATH`.
///
/// `force_docker` skips podman entirely (the `--docker` flag).
pub fn find_engine(force_docker: bool) -> Result<PathBuf, RuntimeError> {
    if force_docker {
        return find_program("docker").ok_or(RuntimeError::EngineUnavailable);
    }
    ENGINE_PREFERENCE
        .iter()
        .find_map(|name| find_program(name))
        .ok_or(RuntimeError::EngineUnavailable)
}

fn find_program(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn finds_executables_on_path() {
        // `sh` exists on any host these tests run on.
        assert!(find_program("sh").is_some());
        assert!(find_program("definitely-not-a-binary-zz").is_none());
    }

    #[test]
    fn executability_check() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain");
        std::fs::write(&plain, "x").unwrap();
        assert!(!is_executable(&plain));

        let exec = tmp.path().join("exec");
        std::fs::write(&exec, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exec, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&exec));
    }
}
