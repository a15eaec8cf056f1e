//! Reputation checks for monitored domains and IPs.
//!
//! Scheduling and delivery live outside the crate: a scheduler calls
//! [`check_and_notify`], which runs one DNSBL or DMARC check and hands a
//! [`MonitorPayload`] to the injected [`Notifier`] only when something is
//! wrong.

mod blocklist;
mod dmarc;
mod lookup;

pub use blocklist::{BlocklistTarget, check_blocklists};
pub use dmarc::{DmarcIssue, DmarcPolicy, DmarcStatus};
pub use lookup::MonitorLookup;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::mx::LookupFailure;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor target is empty")]
    EmptyTarget,
    #[error("invalid monitor target {0}")]
    InvalidTarget(String),
    #[error("DNS lookup failed for {name}: {message}")]
    Lookup { name: String, message: String },
    #[error("notification failed: {0}")]
    Notify(String),
}

impl MonitorError {
    pub(crate) fn lookup(name: &str, failure: LookupFailure) -> Self {
        let message = match failure {
            LookupFailure::Timeout => "timed out".to_string(),
            LookupFailure::Failed(message) => message,
            LookupFailure::NoRecords => "no records".to_string(),
            LookupFailure::NxDomain => "no such domain".to_string(),
        };
        Self::Lookup {
            name: name.to_string(),
            message,
        }
    }
}

/// `[monitor]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorOptions {
    /// DNSBL zones queried for IP targets.
    #[serde(default = "default_ip_zones")]
    pub ip_zones: Vec<String>,
    /// Domain blocklist zones queried for domain targets.
    #[serde(default = "default_domain_zones")]
    pub domain_zones: Vec<String>,
}

fn default_ip_zones() -> Vec<String> {
    ["zen.spamhaus.org", "bl.spamcop.net", "b.barracudacentral.org"]
        .map(String::from)
        .to_vec()
}

fn default_domain_zones() -> Vec<String> {
    ["dbl.spamhaus.org", "multi.uribl.com"].map(String::from).to_vec()
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            ip_zones: default_ip_zones(),
            domain_zones: default_domain_zones(),
        }
    }
}

/// Structured check result handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorPayload {
    Blocklisted { blocklists: Vec<String> },
    Dmarc { issue_type: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    Blocklist,
    Dmarc,
}

/// A monitor as the scheduler knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRef {
    pub id: String,
    pub owner: String,
    pub kind: MonitorKind,
    /// Domain or IP address.
    pub target: String,
}

/// Formats and delivers alerts. Implemented outside the crate.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, monitor: &MonitorRef, payload: &MonitorPayload) -> Result<(), MonitorError>;
}

/// Look up `_dmarc.<domain>` and evaluate it.
pub async fn check_dmarc<L>(lookup: &L, domain: &str) -> Result<DmarcStatus, MonitorError>
where
    L: MonitorLookup + ?Sized,
{
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(MonitorError::EmptyTarget);
    }
    let ascii = idna::domain_to_ascii(trimmed)
        .map_err(|_| MonitorError::InvalidTarget(trimmed.to_string()))?;
    let name = format!("_dmarc.{}", ascii.to_ascii_lowercase());
    let records = lookup
        .lookup_txt(&name)
        .await
        .map_err(|failure| MonitorError::lookup(&name, failure))?;
    Ok(dmarc::evaluate(&records))
}

/// Run the check `monitor` describes and notify when it finds a problem.
///
/// Returns the payload that was sent, `None` when everything is fine.
pub async fn check_and_notify<L, N>(
    lookup: &L,
    notifier: &N,
    monitor: &MonitorRef,
    options: &MonitorOptions,
) -> Result<Option<MonitorPayload>, MonitorError>
where
    L: MonitorLookup + ?Sized,
    N: Notifier + ?Sized,
{
    let payload = match monitor.kind {
        MonitorKind::Blocklist => {
            let target = BlocklistTarget::parse(&monitor.target)?;
            let blocklists = check_blocklists(lookup, &target, options).await?;
            (!blocklists.is_empty()).then_some(MonitorPayload::Blocklisted { blocklists })
        }
        MonitorKind::Dmarc => check_dmarc(lookup, &monitor.target)
            .await?
            .payload(&monitor.target),
    };

    if let Some(payload) = &payload {
        info!(monitor = %monitor.id, target = %monitor.target, ?payload, "monitor alert");
        notifier.notify(monitor, payload).await?;
    }
    Ok(payload)
}
