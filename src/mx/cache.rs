use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::resolver::{LookupFailure, LookupMx, normalize_domain, system_resolver};
use super::{DnsError, DnsOptions, MailRoute, MxRecord, RouteKind};

#[derive(Debug, Clone)]
enum CachedAnswer {
    Route(Arc<MailRoute>),
    NotFound,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    answer: CachedAnswer,
    expires_at: Instant,
}

/// Resolves domains to mail routes with bounded retries and a read-through
/// TTL cache.
///
/// The cache is keyed by ASCII domain and never authoritative: an expired
/// entry is simply resolved again.
pub struct MxResolver {
    lookup: Arc<dyn LookupMx>,
    cache: DashMap<String, CachedEntry>,
    options: DnsOptions,
}

impl std::fmt::Debug for MxResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MxResolver")
            .field("cached", &self.cache.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MxResolver {
    pub fn new(lookup: Arc<dyn LookupMx>, options: DnsOptions) -> Self {
        Self {
            lookup,
            cache: DashMap::new(),
            options,
        }
    }

    /// Resolver backed by the system DNS configuration.
    pub fn from_system_conf(options: DnsOptions) -> Result<Self, DnsError> {
        let resolver = system_resolver(&options)?;
        Ok(Self::new(Arc::new(resolver), options))
    }

    pub fn options(&self) -> &DnsOptions {
        &self.options
    }

    /// Resolve `domain` (Unicode or ASCII) to its mail route.
    ///
    /// # Errors
    ///
    /// [`DnsError::NotFound`] when the domain does not exist or has neither
    /// MX nor address records; [`DnsError::Timeout`] / [`DnsError::Lookup`]
    /// once retries are exhausted.
    pub async fn resolve(&self, domain: &str) -> Result<Arc<MailRoute>, DnsError> {
        let ascii = normalize_domain(domain)?;

        if let Some(hit) = self.cached(&ascii) {
            debug!(domain = %ascii, "mail route cache hit");
            return hit;
        }

        match self.resolve_uncached(&ascii).await {
            Ok(route) => {
                let route = Arc::new(route);
                self.cache.insert(
                    ascii,
                    CachedEntry {
                        answer: CachedAnswer::Route(Arc::clone(&route)),
                        expires_at: Instant::now() + self.options.cache_ttl(),
                    },
                );
                Ok(route)
            }
            Err(err @ DnsError::NotFound { .. }) => {
                self.cache.insert(
                    ascii,
                    CachedEntry {
                        answer: CachedAnswer::NotFound,
                        expires_at: Instant::now() + self.options.negative_ttl(),
                    },
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop every cached answer.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, ascii: &str) -> Option<Result<Arc<MailRoute>, DnsError>> {
        let now = Instant::now();
        let entry = self.cache.get(ascii)?;
        if entry.expires_at <= now {
            drop(entry);
            self.cache.remove(ascii);
            return None;
        }
        Some(match &entry.answer {
            CachedAnswer::Route(route) => Ok(Arc::clone(route)),
            CachedAnswer::NotFound => Err(DnsError::not_found(ascii)),
        })
    }

    async fn resolve_uncached(&self, ascii: &str) -> Result<MailRoute, DnsError> {
        let lookup = Arc::clone(&self.lookup);
        let mx = self
            .retrying(ascii, || {
                let lookup = Arc::clone(&lookup);
                let domain = ascii.to_string();
                async move { lookup.lookup_mx(&domain).await }
            })
            .await;

        match mx {
            Ok(records) if !records.is_empty() => Ok(route_from_records(ascii, records)),
            Ok(_) | Err(LookupFailure::NoRecords) => self.implicit_route(ascii).await,
            Err(failure) => {
                if failure.is_retryable() {
                    warn!(domain = %ascii, ?failure, "MX lookup failed after retries");
                }
                Err(failure.into_dns_error(ascii))
            }
        }
    }

    async fn implicit_route(&self, ascii: &str) -> Result<MailRoute, DnsError> {
        let lookup = Arc::clone(&self.lookup);
        let has_address = self
            .retrying(ascii, || {
                let lookup = Arc::clone(&lookup);
                let domain = ascii.to_string();
                async move { lookup.has_address(&domain).await }
            })
            .await;

        match has_address {
            Ok(true) => {
                debug!(domain = %ascii, "no MX records, using implicit A/AAAA route");
                Ok(MailRoute {
                    domain: ascii.to_string(),
                    kind: RouteKind::Implicit,
                    hosts: vec![MxRecord::new(0, ascii)],
                })
            }
            Ok(false) => Err(DnsError::not_found(ascii)),
            Err(failure) => Err(failure.into_dns_error(ascii)),
        }
    }

    async fn retrying<T, F, Fut>(&self, ascii: &str, mut query: F) -> Result<T, LookupFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LookupFailure>>,
    {
        let mut attempt = 0;
        loop {
            match query().await {
                Err(failure) if failure.is_retryable() && attempt < self.options.retries => {
                    attempt += 1;
                    debug!(domain = %ascii, attempt, ?failure, "retrying DNS query");
                    tokio::time::sleep(self.options.retry_backoff()).await;
                }
                other => return other,
            }
        }
    }
}

fn route_from_records(ascii: &str, mut records: Vec<MxRecord>) -> MailRoute {
    // Sorted by preference first, so each exchange keeps its best one.
    records.sort();
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.exchange.clone()));

    let null_mx = records.iter().all(|record| record.exchange.is_empty());
    if null_mx {
        return MailRoute {
            domain: ascii.to_string(),
            kind: RouteKind::NullMx,
            hosts: Vec::new(),
        };
    }

    records.retain(|record| !record.exchange.is_empty());
    MailRoute {
        domain: ascii.to_string(),
        kind: RouteKind::Mx,
        hosts: records,
    }
}
