use thiserror::Error;

use crate::bulk::JobError;
use crate::config::ConfigError;
use crate::monitor::MonitorError;
use crate::mx::DnsError;
use crate::reference::ReferenceError;
use crate::smtp_verify::SmtpProbeError;
use crate::storage::StorageError;

/// Any error the crate can return, for callers that do not care which
/// component failed.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Dns(#[from] DnsError),
    #[error(transparent)]
    Smtp(#[from] SmtpProbeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}
