//! Per-domain SMTP rate limiting using a sliding window log.
//!
//! Each destination domain keeps the instants of its recent connection
//! attempts. An attempt is granted while fewer than `max_attempts` fall inside
//! the trailing `window_secs`; otherwise the caller gets the domain and how
//! long to wait. The limiter never blocks: requeueing is the caller's job.
//!
//! ```text
//! max_attempts: 3, window: 60s
//! t=0s, 5s, 10s  -> granted
//! t=20s          -> rejected, retry after 40s
//! t=60s          -> granted (t=0s left the window)
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// `[rate_limit]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitOptions {
    /// Attempts allowed per domain inside one window.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Per-domain overrides, keyed by ASCII domain.
    #[serde(default)]
    pub domain_limits: HashMap<String, DomainRateLimit>,
}

const fn default_max_attempts() -> u32 {
    20
}

const fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window_secs(),
            domain_limits: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainRateLimit {
    pub max_attempts: u32,
    pub window_secs: u64,
}

/// Rejection returned when a domain is out of budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SMTP rate limit exceeded for {domain}, retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub domain: String,
    /// Whole seconds, always at least 1.
    pub retry_after_secs: u64,
}

impl RateLimitExceeded {
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }
}

/// Proof that an attempt was counted against the domain budget.
#[derive(Debug)]
#[must_use = "a permit stands for one counted SMTP attempt"]
pub struct RatePermit {
    pub domain: String,
}

/// Point-in-time view of one domain window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub domain: String,
    pub attempts_in_window: usize,
    pub next_allowed_at: Option<Instant>,
}

#[derive(Debug)]
struct AttemptWindow {
    attempts: VecDeque<Instant>,
    max_attempts: usize,
    window: Duration,
    next_allowed_at: Option<Instant>,
}

impl AttemptWindow {
    fn new(limit: DomainRateLimit) -> Self {
        Self {
            attempts: VecDeque::new(),
            max_attempts: limit.max_attempts.max(1) as usize,
            window: Duration::from_secs(limit.window_secs.max(1)),
            next_allowed_at: None,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.attempts.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.evict(now);

        if self.attempts.len() < self.max_attempts {
            self.attempts.push_back(now);
            self.next_allowed_at = if self.attempts.len() < self.max_attempts {
                None
            } else {
                self.attempts.front().map(|oldest| *oldest + self.window)
            };
            return Ok(());
        }

        let wait = self
            .attempts
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);
        self.next_allowed_at = Some(now + wait);
        Err(wait)
    }
}

/// Acquisitions between two sweeps of idle windows.
const PURGE_EVERY: u64 = 1024;

/// Per-domain limiter shared by every worker.
#[derive(Debug)]
pub struct SmtpRateLimiter {
    windows: DashMap<String, Arc<Mutex<AttemptWindow>>>,
    options: RateLimitOptions,
    acquisitions: AtomicU64,
}

impl SmtpRateLimiter {
    pub fn new(options: RateLimitOptions) -> Self {
        Self {
            windows: DashMap::new(),
            options,
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Count one SMTP attempt against `domain`.
    ///
    /// # Errors
    ///
    /// [`RateLimitExceeded`] with a positive `retry_after_secs` when the
    /// domain has used its budget for the current window.
    pub fn acquire(&self, domain: &str) -> Result<RatePermit, RateLimitExceeded> {
        self.acquire_at(domain, Instant::now())
    }

    pub(crate) fn acquire_at(
        &self,
        domain: &str,
        now: Instant,
    ) -> Result<RatePermit, RateLimitExceeded> {
        if self.acquisitions.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_idle_at(now);
        }

        let domain = domain.to_ascii_lowercase();
        let window = self.window(&domain);
        let outcome = window.lock().try_acquire(now);

        match outcome {
            Ok(()) => Ok(RatePermit { domain }),
            Err(wait) => {
                let retry_after_secs = whole_seconds(wait);
                debug!(%domain, retry_after_secs, "SMTP rate limit reached");
                Err(RateLimitExceeded {
                    domain,
                    retry_after_secs,
                })
            }
        }
    }

    pub fn snapshot(&self, domain: &str) -> Option<RateLimitSnapshot> {
        let domain = domain.to_ascii_lowercase();
        let window = self.windows.get(&domain)?.clone();
        let mut guard = window.lock();
        guard.evict(Instant::now());
        Some(RateLimitSnapshot {
            domain,
            attempts_in_window: guard.attempts.len(),
            next_allowed_at: guard.next_allowed_at,
        })
    }

    /// Drop the windows of domains with no attempt left in their window.
    /// Returns how many were dropped. `acquire` also does this periodically.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    pub(crate) fn purge_idle_at(&self, now: Instant) -> usize {
        let mut purged = 0;
        // A window cloned out of the map is in use and stays.
        self.windows.retain(|_, window| {
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let mut guard = window.lock();
            guard.evict(now);
            let keep = !guard.attempts.is_empty();
            if !keep {
                purged += 1;
            }
            keep
        });
        if purged > 0 {
            debug!(purged, remaining = self.windows.len(), "idle rate-limit windows dropped");
        }
        purged
    }

    fn window(&self, domain: &str) -> Arc<Mutex<AttemptWindow>> {
        self.windows
            .entry(domain.to_string())
            .or_insert_with(|| {
                let limit = self.limit_for(domain);
                Arc::new(Mutex::new(AttemptWindow::new(limit)))
            })
            .clone()
    }

    fn limit_for(&self, domain: &str) -> DomainRateLimit {
        self.options
            .domain_limits
            .get(domain)
            .copied()
            .unwrap_or(DomainRateLimit {
                max_attempts: self.options.max_attempts,
                window_secs: self.options.window_secs,
            })
    }
}

fn whole_seconds(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, window_secs: u64) -> SmtpRateLimiter {
        SmtpRateLimiter::new(RateLimitOptions {
            max_attempts,
            window_secs,
            domain_limits: HashMap::new(),
        })
    }

    #[test]
    fn grants_up_to_the_limit_then_rejects() {
        let limiter = limiter(3, 60);
        let t0 = Instant::now();

        for i in 0..3 {
            let _permit = limiter
                .acquire_at("example.com", t0 + Duration::from_secs(i * 5))
                .expect("within budget");
        }

        let err = limiter
            .acquire_at("example.com", t0 + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(err.domain, "example.com");
        assert_eq!(err.retry_after_secs, 40);
    }

    #[test]
    fn retry_after_is_never_zero() {
        let limiter = limiter(1, 1);
        let t0 = Instant::now();
        let _permit = limiter.acquire_at("example.com", t0).unwrap();

        let err = limiter
            .acquire_at("example.com", t0 + Duration::from_millis(999))
            .unwrap_err();
        assert!(err.retry_after_secs >= 1);
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(2, 60);
        let t0 = Instant::now();
        let _a = limiter.acquire_at("example.com", t0).unwrap();
        let _b = limiter
            .acquire_at("example.com", t0 + Duration::from_secs(30))
            .unwrap();
        assert!(
            limiter
                .acquire_at("example.com", t0 + Duration::from_secs(59))
                .is_err()
        );
        let _c = limiter
            .acquire_at("example.com", t0 + Duration::from_secs(60))
            .expect("first attempt left the window");
    }

    #[test]
    fn domains_are_independent_and_case_insensitive() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        let _a = limiter.acquire_at("Example.com", t0).unwrap();
        assert!(limiter.acquire_at("example.COM", t0).is_err());
        let _b = limiter.acquire_at("other.org", t0).unwrap();
    }

    #[test]
    fn domain_override_applies() {
        let mut domain_limits = HashMap::new();
        domain_limits.insert(
            "gmail.com".to_string(),
            DomainRateLimit {
                max_attempts: 1,
                window_secs: 300,
            },
        );
        let limiter = SmtpRateLimiter::new(RateLimitOptions {
            max_attempts: 100,
            window_secs: 60,
            domain_limits,
        });
        let t0 = Instant::now();

        let _a = limiter.acquire_at("gmail.com", t0).unwrap();
        let err = limiter.acquire_at("gmail.com", t0).unwrap_err();
        assert_eq!(err.retry_after_secs, 300);
        let _b = limiter.acquire_at("yahoo.com", t0).unwrap();
        let _c = limiter.acquire_at("yahoo.com", t0).unwrap();
    }

    #[test]
    fn snapshot_reports_usage() {
        let limiter = limiter(2, 60);
        assert!(limiter.snapshot("example.com").is_none());
        let _a = limiter.acquire("example.com").unwrap();
        let _b = limiter.acquire("example.com").unwrap();
        let snap = limiter.snapshot("example.com").unwrap();
        assert_eq!(snap.attempts_in_window, 2);
        assert!(snap.next_allowed_at.is_some());
    }

    #[test]
    fn idle_windows_are_purged() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        for i in 0..100 {
            let _permit = limiter.acquire_at(&format!("d{i}.example"), t0).unwrap();
        }
        let _busy = limiter
            .acquire_at("busy.example", t0 + Duration::from_secs(90))
            .unwrap();

        assert_eq!(limiter.purge_idle_at(t0 + Duration::from_secs(120)), 100);
        assert_eq!(limiter.windows.len(), 1);
        assert!(
            limiter
                .acquire_at("busy.example", t0 + Duration::from_secs(120))
                .is_err()
        );
        let _again = limiter
            .acquire_at("d0.example", t0 + Duration::from_secs(120))
            .expect("purged domain starts with a fresh budget");
    }

    #[test]
    fn acquire_sweeps_idle_windows_periodically() {
        let limiter = limiter(1, 60);
        let t0 = Instant::now();
        for i in 0..PURGE_EVERY {
            let _permit = limiter.acquire_at(&format!("early{i}.example"), t0).unwrap();
        }
        let later = t0 + Duration::from_secs(3_600);
        for i in 0..PURGE_EVERY {
            let _permit = limiter.acquire_at(&format!("late{i}.example"), later).unwrap();
        }
        assert_eq!(limiter.windows.len(), PURGE_EVERY as usize);
        assert!(!limiter.windows.contains_key("early0.example"));
    }

    #[test]
    fn concurrent_acquires_never_exceed_budget() {
        let limiter = Arc::new(limiter(50, 3_600));
        let granted = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let granted = granted.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if limiter.acquire("example.com").is_ok() {
                            granted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(granted.load(std::sync::atomic::Ordering::SeqCst), 50);
    }
}
