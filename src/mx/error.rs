use thiserror::Error;

/// Errors surfaced by [`MxResolver`](super::MxResolver).
///
/// Cloneable so negative answers can be cached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed for {domain}")]
    IdnaConversion { domain: String },
    #[error("domain {domain} has no MX, A or AAAA record")]
    NotFound { domain: String },
    #[error("DNS lookup timed out for {domain}")]
    Timeout { domain: String },
    #[error("DNS lookup failed for {domain}: {message}")]
    Lookup { domain: String, message: String },
    #[error("resolver initialization failed: {message}")]
    ResolverInit { message: String },
}

impl DnsError {
    pub(crate) fn idna(domain: &str) -> Self {
        Self::IdnaConversion {
            domain: domain.to_string(),
        }
    }

    pub(crate) fn not_found(domain: &str) -> Self {
        Self::NotFound {
            domain: domain.to_string(),
        }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit {
            message: source.to_string(),
        }
    }

    /// `true` for failures worth retrying later (timeouts, SERVFAIL...).
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Lookup { .. })
    }
}
