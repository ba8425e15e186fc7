use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role a containerized daemon plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonKind {
    Mon,
    Mgr,
    Osd,
    Mds,
    Rgw,
}

impl DaemonKind {
    pub const ALL: [DaemonKind; 5] = [
        DaemonKind::Mon,
        DaemonKind::Mgr,
        DaemonKind::Osd,
        DaemonKind::Mds,
        DaemonKind::Rgw,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DaemonKind::Mon => "mon",
            DaemonKind::Mgr => "mgr",
            DaemonKind::Osd => "osd",
            DaemonKind::Mds => "mds",
            DaemonKind::Rgw => "rgw",
        }
    }

    /// Removing a daemon of this kind may destroy unrecoverable data, so
    /// `rm-daemon` demands an explicit `--force`.
    pub fn requires_force_removal(self) -> bool {
        matches!(self, DaemonKind::Mon | DaemonKind::Osd)
    }

    /// OSD containers need device and sysfs access.
    pub fn privileged(self) -> bool {
        matches!(self, DaemonKind::Osd)
    }

    /// Name of the daemon binary inside the container image.
    pub fn entrypoint(self) -> String {
        format!("/usr/bin/shoal-{}", self.as_str())
    }
}

impl FromStr for DaemonKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mon" => Ok(DaemonKind::Mon),
            "mgr" => Ok(DaemonKind::Mgr),
            "osd" => Ok(DaemonKind::Osd),
            "mds" => Ok(DaemonKind::Mds),
            "rgw" => Ok(DaemonKind::Rgw),
            other => Err(SchemaError::UnknownDaemonKind(other.to_owned())),
        }
    }
}

impl fmt::Display for DaemonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daemon instance, addressed as `<kind>.<id>` (e.g. `mon.a`, `osd.3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DaemonName {
    pub kind: DaemonKind,
    pub id: String,
}

impl DaemonName {
    pub fn new(kind: DaemonKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl FromStr for DaemonName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('.')
            .ok_or_else(|| SchemaError::InvalidDaemonName(s.to_owned()))?;
        if id.is_empty() {
            return Err(SchemaError::InvalidDaemonName(s.to_owned()));
        }
        Ok(Self {
            kind: kind.parse()?,
            id: id.to_owned(),
        })
    }
}

impl fmt::Display for DaemonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.id)
    }
}
