use std::net::IpAddr;

use tracing::{debug, warn};

use super::lookup::dnsbl_query;
use super::{MonitorError, MonitorLookup, MonitorOptions};
use crate::mx::LookupFailure;

/// What a blocklist check looks up: an IP in the IP zones, a domain in the
/// domain zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlocklistTarget {
    Ip(IpAddr),
    Domain(String),
}

impl BlocklistTarget {
    /// IP literal or domain name, IDNA-converted.
    pub fn parse(input: &str) -> Result<Self, MonitorError> {
        let trimmed = input.trim().trim_end_matches('.');
        if trimmed.is_empty() {
            return Err(MonitorError::EmptyTarget);
        }
        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Ok(Self::Ip(ip));
        }
        idna::domain_to_ascii(trimmed)
            .map(|ascii| Self::Domain(ascii.to_ascii_lowercase()))
            .map_err(|_| MonitorError::InvalidTarget(trimmed.to_string()))
    }
}

impl std::fmt::Display for BlocklistTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Domain(domain) => f.write_str(domain),
        }
    }
}

/// Zones listing `target`, in configuration order.
///
/// A zone answers with an address in `127.0.0.0/8` when the target is
/// listed. Zones that fail to answer are skipped; if every zone fails the
/// last failure is returned.
pub async fn check_blocklists<L>(
    lookup: &L,
    target: &BlocklistTarget,
    options: &MonitorOptions,
) -> Result<Vec<String>, MonitorError>
where
    L: MonitorLookup + ?Sized,
{
    let zones = match target {
        BlocklistTarget::Ip(_) => &options.ip_zones,
        BlocklistTarget::Domain(_) => &options.domain_zones,
    };

    let mut listed = Vec::new();
    let mut answered = 0usize;
    let mut last_failure: Option<(String, LookupFailure)> = None;

    for zone in zones {
        let zone = zone.trim().trim_matches('.');
        if zone.is_empty() {
            continue;
        }
        let name = match target {
            BlocklistTarget::Ip(ip) => dnsbl_query(*ip, zone),
            BlocklistTarget::Domain(domain) => format!("{domain}.{zone}"),
        };
        match lookup.lookup_ipv4(&name).await {
            Ok(addresses) => {
                answered += 1;
                if addresses.iter().any(|addr| addr.is_loopback()) {
                    debug!(%target, zone, "listed");
                    listed.push(zone.to_string());
                }
            }
            Err(failure) => {
                warn!(%target, zone, ?failure, "blocklist query failed");
                last_failure = Some((name, failure));
            }
        }
    }

    match last_failure {
        Some((name, failure)) if answered == 0 => Err(MonitorError::lookup(&name, failure)),
        _ => Ok(listed),
    }
}
