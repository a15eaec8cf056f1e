use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::lookup::TxtLookup;

use crate::mx::LookupFailure;

/// DNS queries needed by the monitor checks.
///
/// Empty answers (NODATA, NXDOMAIN) are `Ok(vec![])`, not errors: for a
/// DNSBL they mean "not listed", for DMARC "no record".
#[async_trait]
pub trait MonitorLookup: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure>;

    async fn lookup_ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupFailure>;
}

#[async_trait]
impl MonitorLookup for TokioAsyncResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, LookupFailure> {
        match self.txt_lookup(name).await {
            Ok(lookup) => Ok(collect_txt_records(&lookup)),
            Err(err) => empty_on_missing(LookupFailure::from(err)),
        }
    }

    async fn lookup_ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, LookupFailure> {
        match self.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|a| a.0).collect()),
            Err(err) => empty_on_missing(LookupFailure::from(err)),
        }
    }
}

fn empty_on_missing<T>(failure: LookupFailure) -> Result<Vec<T>, LookupFailure> {
    match failure {
        LookupFailure::NoRecords | LookupFailure::NxDomain => Ok(Vec::new()),
        other => Err(other),
    }
}

// Segments of one TXT record are concatenated; invalid UTF-8 is replaced.
fn collect_txt_records(lookup: &TxtLookup) -> Vec<String> {
    lookup
        .iter()
        .map(|txt| {
            txt.txt_data()
                .iter()
                .map(|piece| String::from_utf8_lossy(piece))
                .collect::<String>()
        })
        .collect()
}

/// Reverse-order query name for `ip` inside a DNSBL `zone`.
pub(crate) fn dnsbl_query(ip: IpAddr, zone: &str) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.{zone}")
        }
        IpAddr::V6(v6) => {
            let mut labels = Vec::with_capacity(33);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            labels.push(zone.to_string());
            labels.join(".")
        }
    }
}
