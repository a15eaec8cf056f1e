use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// `[skip_list]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipListOptions {
    /// Skip duration after the first recorded failure.
    #[serde(default = "default_base_backoff_secs")]
    pub base_backoff_secs: u64,
    /// Upper bound for the doubled skip duration.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Soft failures (timeouts, 4xx) needed before a host is recorded.
    #[serde(default = "default_soft_failure_threshold")]
    pub soft_failure_threshold: u32,
    /// Window in which soft failures are counted.
    #[serde(default = "default_soft_failure_window_secs")]
    pub soft_failure_window_secs: u64,
    /// Interval of the background sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_base_backoff_secs() -> u64 {
    15 * 60
}

const fn default_max_backoff_secs() -> u64 {
    24 * 60 * 60
}

const fn default_soft_failure_threshold() -> u32 {
    3
}

const fn default_soft_failure_window_secs() -> u64 {
    10 * 60
}

const fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

impl Default for SkipListOptions {
    fn default() -> Self {
        Self {
            base_backoff_secs: default_base_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            soft_failure_threshold: default_soft_failure_threshold(),
            soft_failure_window_secs: default_soft_failure_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SkipListOptions {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_secs: self.base_backoff_secs.max(1),
            max_secs: self.max_backoff_secs.max(self.base_backoff_secs.max(1)),
        }
    }

    pub fn soft_failure_window(&self) -> TimeDelta {
        seconds(self.soft_failure_window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Bounded exponential backoff: `base × 2^(n−1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub max_secs: u64,
}

impl BackoffPolicy {
    pub fn duration(&self, failure_count: u32) -> TimeDelta {
        let exponent = failure_count.saturating_sub(1).min(32);
        let secs = self
            .base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_secs);
        seconds(secs)
    }

    pub fn expiry(&self, failure_count: u32, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_signed(self.duration(failure_count))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

// Ten years; anything longer is a configuration mistake.
const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::seconds(secs.min(MAX_SECS) as i64)
}
