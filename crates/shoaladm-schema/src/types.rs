//! The cluster instance identifier.
//!
//! Serializes/deserializes as a plain string; validation happens in
//! [`ClusterId::parse`], not in serde.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Globally unique identifier of one cluster instance. All per-daemon
/// directories and systemd units are namespaced under it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(String);

impl ClusterId {
    /// Wrap a string that is already known to be UUID-shaped (e.g. a
    /// directory name that passed [`ClusterId::is_valid`]).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Generate a fresh identifier. Every call yields a new value.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Validate an explicitly supplied identifier.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        if Self::is_valid(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(SchemaError::InvalidClusterId(s.to_owned()))
        }
    }

    pub fn is_valid(s: &str) -> bool {
        uuid::Uuid::parse_str(s).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for ClusterId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClusterId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_fresh_per_call() {
        assert_ne!(ClusterId::generate(), ClusterId::generate());
    }

    #[test]
    fn parse_accepts_generated_ids() {
        let id = ClusterId::generate();
        let reparsed = ClusterId::parse(id.as_str()).unwrap();
        assert_eq!(id, reparsed);
    }

    #[test]
    fn parse_is_stable() {
        let a = ClusterId::parse("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90").unwrap();
        let b = ClusterId::parse("2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_rejects_non_uuid_shapes() {
        for bad in ["", "mon", "not-a-uuid", "1234", "2d5a7f4e-8c1b"] {
            let err = ClusterId::parse(bad).unwrap_err();
            assert!(err.to_string().contains(bad) || bad.is_empty());
        }
    }

    #[test]
    fn serde_roundtrip_is_transparent() {
        let id = ClusterId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ClusterId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
