use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[bulk]` settings, shared by bulk jobs and batch verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkOptions {
    /// Concurrent verifications.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Extra passes granted to rate-limited addresses.
    #[serde(default = "default_max_requeue_passes")]
    pub max_requeue_passes: u32,
    /// Upper bound on the pause before a requeue pass.
    #[serde(default = "default_max_requeue_wait_secs")]
    pub max_requeue_wait_secs: u64,
    #[serde(default = "default_storage_retries")]
    pub storage_retries: u32,
    #[serde(default = "default_storage_retry_backoff_ms")]
    pub storage_retry_backoff_ms: u64,
    /// Where result artifacts are written, one `<job id>.csv` per job.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

const fn default_workers() -> usize {
    16
}

const fn default_max_requeue_passes() -> u32 {
    3
}

const fn default_max_requeue_wait_secs() -> u64 {
    60
}

const fn default_storage_retries() -> u32 {
    3
}

const fn default_storage_retry_backoff_ms() -> u64 {
    100
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_requeue_passes: default_max_requeue_passes(),
            max_requeue_wait_secs: default_max_requeue_wait_secs(),
            storage_retries: default_storage_retries(),
            storage_retry_backoff_ms: default_storage_retry_backoff_ms(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

impl BulkOptions {
    pub fn max_requeue_wait(&self) -> Duration {
        Duration::from_secs(self.max_requeue_wait_secs)
    }

    pub fn storage_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.storage_retry_backoff_ms)
    }
}
