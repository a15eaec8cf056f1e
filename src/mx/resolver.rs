use async_trait::async_trait;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

use super::{DnsError, DnsOptions, MxRecord};

/// Raw outcome of a single DNS query, before retry and caching policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The name exists but has no record of the requested type.
    NoRecords,
    /// NXDOMAIN.
    NxDomain,
    Timeout,
    Failed(String),
}

impl LookupFailure {
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Failed(_))
    }

    pub(crate) fn into_dns_error(self, domain: &str) -> DnsError {
        match self {
            Self::NoRecords | Self::NxDomain => DnsError::not_found(domain),
            Self::Timeout => DnsError::Timeout {
                domain: domain.to_string(),
            },
            Self::Failed(message) => DnsError::Lookup {
                domain: domain.to_string(),
                message,
            },
        }
    }
}

impl From<ResolveError> for LookupFailure {
    fn from(err: ResolveError) -> Self {
        match err.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                if *response_code == ResponseCode::NXDomain {
                    Self::NxDomain
                } else {
                    Self::NoRecords
                }
            }
            ResolveErrorKind::Timeout => Self::Timeout,
            _ => Self::Failed(err.to_string()),
        }
    }
}

/// DNS backend used by [`MxResolver`](super::MxResolver).
#[async_trait]
pub trait LookupMx: Send + Sync {
    /// MX records for an ASCII domain, exchanges already normalized.
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupFailure>;

    /// Whether the name carries at least one A or AAAA record.
    async fn has_address(&self, domain: &str) -> Result<bool, LookupFailure>;
}

#[async_trait]
impl LookupMx for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, LookupFailure> {
        let lookup = self.mx_lookup(domain).await?;
        Ok(lookup
            .iter()
            .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8())))
            .collect())
    }

    async fn has_address(&self, domain: &str) -> Result<bool, LookupFailure> {
        match self.lookup_ip(domain).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(err) => match LookupFailure::from(err) {
                LookupFailure::NoRecords => Ok(false),
                other => Err(other),
            },
        }
    }
}

/// Build a tokio resolver from the system configuration with our timeout.
///
/// Retries are handled by [`MxResolver`](super::MxResolver), so the
/// resolver itself makes a single attempt per query.
pub fn system_resolver(options: &DnsOptions) -> Result<TokioAsyncResolver, DnsError> {
    let (config, mut opts) =
        trust_dns_resolver::system_conf::read_system_conf().map_err(DnsError::resolver_init)?;
    opts.timeout = options.timeout();
    opts.attempts = 1;
    Ok(TokioAsyncResolver::tokio(config, opts))
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, DnsError> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(DnsError::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(|_| DnsError::idna(trimmed))
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}
