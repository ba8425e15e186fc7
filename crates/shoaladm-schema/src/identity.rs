use crate::types::ClusterId;
use crate::SchemaError;
use serde::Serialize;

/// Immutable identity of one cluster instance on this host.
///
/// Once any daemon directory exists on disk for a given identity, the
/// identity must not change except through an explicit adoption step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub cluster_id: ClusterId,
    pub mon_id: String,
    pub mgr_id: String,
    pub image: String,
}

impl ClusterIdentity {
    /// Resolve an identity from optional explicit inputs.
    ///
    /// An explicit cluster id is validated and used unchanged; otherwise a
    /// fresh one is generated. Monitor and manager ids default to the local
    /// hostname.
    pub fn resolve(
        image: impl Into<String>,
        cluster_id: Option<&str>,
        mon_id: Option<&str>,
        mgr_id: Option<&str>,
    ) -> Result<Self, SchemaError> {
        let cluster_id = match cluster_id {
            Some(explicit) => ClusterId::parse(explicit)?,
            None => ClusterId::generate(),
        };
        Ok(Self {
            cluster_id,
            mon_id: resolve_host_id(mon_id),
            mgr_id: resolve_host_id(mgr_id),
            image: image.into(),
        })
    }
}

/// The supplied daemon id, or the local host's name.
pub fn resolve_host_id(explicit: Option<&str>) -> String {
    match explicit {
        Some(id) => id.to_owned(),
        None => local_hostname(),
    }
}

pub fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_id_is_used_unchanged() {
        let identity = ClusterIdentity::resolve(
            "registry.example.com/shoal:v1",
            Some("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90"),
            Some("a"),
            None,
        )
        .unwrap();
        assert_eq!(
            identity.cluster_id.as_str(),
            "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90"
        );
        assert_eq!(identity.mon_id, "a");
        assert_eq!(identity.mgr_id, local_hostname());
    }

    #[test]
    fn malformed_explicit_id_fails() {
        let err = ClusterIdentity::resolve("img", Some("not-a-uuid"), None, None).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidClusterId(_)));
    }

    #[test]
    fn absent_id_generates_fresh_identities() {
        let a = ClusterIdentity::resolve("img", None, None, None).unwrap();
        let b = ClusterIdentity::resolve("img", None, None, None).unwrap();
        assert_ne!(a.cluster_id, b.cluster_id);
    }

    #[test]
    fn host_id_defaults_to_hostname() {
        assert_eq!(resolve_host_id(None), local_hostname());
        assert_eq!(resolve_host_id(Some("node7")), "node7");
    }
}
