use shoaladm_schema::MonAddr;
use shoaladm_store::{Ownership, StoreLayout};
use std::path::PathBuf;
use std::time::Duration;

/// Resolved, read-only configuration for one invocation.
///
/// Built once by the CLI from flags and never mutated afterwards; the
/// engine treats it as immutable input.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub image: String,
    /// Container engine binary, resolved at startup.
    pub engine: PathBuf,
    pub layout: StoreLayout,
    /// Explicit cluster id; generated during bootstrap when absent.
    pub cluster_id: Option<String>,
    pub mon_id: Option<String>,
    pub mgr_id: Option<String>,
    /// Explicit daemon ownership; extracted from the image when absent.
    pub owner: Option<Ownership>,
    pub mon_addr: Option<MonAddr>,
    pub output_keyring: Option<PathBuf>,
    pub output_config: Option<PathBuf>,
    pub output_pub_ssh_key: Option<PathBuf>,
    pub skip_ssh: bool,
    /// Delay between manager readiness polls during bootstrap.
    pub wait_interval: Duration,
    /// Poll ceiling; exhaustion is a distinct timeout error.
    pub wait_attempts: u32,
}

impl RunConfig {
    pub fn new(
        image: impl Into<String>,
        engine: impl Into<PathBuf>,
        layout: StoreLayout,
    ) -> Self {
        Self {
            image: image.into(),
            engine: engine.into(),
            layout,
            cluster_id: None,
            mon_id: None,
            mgr_id: None,
            owner: None,
            mon_addr: None,
            output_keyring: None,
            output_config: None,
            output_pub_ssh_key: None,
            skip_ssh: false,
            wait_interval: Duration::from_secs(2),
            wait_attempts: 60,
        }
    }
}
