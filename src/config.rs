//! Engine configuration, one TOML table per component.
//!
//! ```toml
//! [dns]
//! timeout_ms = 3000
//!
//! [rate_limit]
//! max_attempts = 10
//! window_secs = 60
//!
//! [rate_limit.domain_limits."gmail.com"]
//! max_attempts = 5
//! window_secs = 60
//!
//! [bulk]
//! workers = 32
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bulk::BulkOptions;
use crate::monitor::MonitorOptions;
use crate::mx::DnsOptions;
use crate::pipeline::PipelineOptions;
use crate::ratelimit::RateLimitOptions;
use crate::skiplist::SkipListOptions;
use crate::smtp_verify::SmtpProbeOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `[reference]`: where to load reference lists from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceOptions {
    /// Directory of list files; built-in lists when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub dns: DnsOptions,
    #[serde(default)]
    pub smtp: SmtpProbeOptions,
    #[serde(default)]
    pub skip_list: SkipListOptions,
    #[serde(default)]
    pub rate_limit: RateLimitOptions,
    #[serde(default)]
    pub pipeline: PipelineOptions,
    #[serde(default)]
    pub bulk: BulkOptions,
    #[serde(default)]
    pub reference: ReferenceOptions,
    #[serde(default)]
    pub monitor: MonitorOptions,
}

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::DisposablePolicy;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn sections_override_their_component() {
        let config = EngineConfig::from_toml(
            r#"
            [dns]
            timeout_ms = 1500

            [rate_limit]
            max_attempts = 4

            [rate_limit.domain_limits."gmail.com"]
            max_attempts = 2
            window_secs = 30

            [pipeline]
            disposable_policy = "undeliverable"

            [bulk]
            workers = 2
            artifact_dir = "/var/lib/mailverify"

            [reference]
            dir = "/etc/mailverify/lists"
            "#,
        )
        .unwrap();

        assert_eq!(config.dns.timeout_ms, 1500);
        assert_eq!(config.dns.retries, DnsOptions::default().retries);
        assert_eq!(config.rate_limit.max_attempts, 4);
        assert_eq!(config.rate_limit.domain_limits["gmail.com"].window_secs, 30);
        assert_eq!(config.pipeline.disposable_policy, DisposablePolicy::Undeliverable);
        assert_eq!(config.bulk.workers, 2);
        assert_eq!(config.bulk.artifact_dir, PathBuf::from("/var/lib/mailverify"));
        assert_eq!(config.reference.dir, Some(PathBuf::from("/etc/mailverify/lists")));
        assert_eq!(config.smtp, SmtpProbeOptions::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = EngineConfig::from_toml("[bulk]\nworker = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(EngineConfig::from_toml("[unknown]\n").is_err());
    }
}
