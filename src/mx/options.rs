use std::time::Duration;

use serde::{Deserialize, Serialize};

/// DNS settings for the MX resolver (`[dns]` section of the config file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsOptions {
    /// Per-query timeout handed to the resolver.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts after a timeout or server failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Pause between two attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Lifetime of a cached route.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Lifetime of a cached "domain not found" answer.
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
}

const fn default_timeout_ms() -> u64 {
    5_000
}

const fn default_retries() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    250
}

const fn default_cache_ttl_secs() -> u64 {
    3_600
}

const fn default_negative_ttl_secs() -> u64 {
    300
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            negative_ttl_secs: default_negative_ttl_secs(),
        }
    }
}

impl DnsOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }
}
