//! MX skip list: per-host circuit breaker shared by every verification.
//!
//! Hosts that refuse connections, break the protocol or answer with
//! anti-abuse rejections are recorded immediately. Timeouts and 4xx replies
//! only count as strikes; a host is recorded once enough strikes land inside
//! the configured window, so a single slow answer never skip-lists it.
//!
//! ```text
//! failure #1  -> expires_at = now + base
//! failure #n  -> expires_at = now + min(base * 2^(n-1), max)
//! manual      -> expires_at = None (never expires)
//! ```
//!
//! Expiry is evaluated lazily: an expired row stops blocking the moment its
//! `expires_at` passes, whether or not the sweep has deleted it yet.

mod options;
mod types;

pub use options::{BackoffPolicy, SkipListOptions};
pub use types::{FailureKind, MxSkipEntry, SkipFailure};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::storage::{SkipListStore, StorageError};

pub struct MxSkipList {
    store: Arc<dyn SkipListStore>,
    options: SkipListOptions,
    strikes: DashMap<String, Vec<DateTime<Utc>>>,
}

impl std::fmt::Debug for MxSkipList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MxSkipList")
            .field("options", &self.options)
            .field("hosts_with_strikes", &self.strikes.len())
            .finish_non_exhaustive()
    }
}

impl MxSkipList {
    pub fn new(store: Arc<dyn SkipListStore>, options: SkipListOptions) -> Self {
        Self {
            store,
            options,
            strikes: DashMap::new(),
        }
    }

    pub fn options(&self) -> &SkipListOptions {
        &self.options
    }

    /// Whether `host` must not be probed right now.
    pub async fn is_skipped(&self, host: &str) -> Result<bool, StorageError> {
        self.is_skipped_at(host, Utc::now()).await
    }

    pub async fn is_skipped_at(&self, host: &str, now: DateTime<Utc>) -> Result<bool, StorageError> {
        let host = normalize_host(host);
        Ok(self
            .store
            .get_skip_entry(&host)
            .await?
            .is_some_and(|entry| entry.is_active(now)))
    }

    /// Report a failure against `host`.
    ///
    /// Returns the persisted row when the failure was recorded, `None` when a
    /// soft failure only added a strike.
    pub async fn record_failure(
        &self,
        host: &str,
        kind: FailureKind,
        raw_response: Option<&str>,
    ) -> Result<Option<MxSkipEntry>, StorageError> {
        self.record_failure_at(host, kind, raw_response, Utc::now())
            .await
    }

    pub async fn record_failure_at(
        &self,
        host: &str,
        kind: FailureKind,
        raw_response: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<MxSkipEntry>, StorageError> {
        let host = normalize_host(host);

        if !kind.is_hard() && !self.add_strike(&host, now) {
            debug!(%host, %kind, "soft failure counted as strike");
            return Ok(None);
        }

        let failure = SkipFailure {
            host: host.clone(),
            kind,
            response: raw_response.map(truncate_response),
            at: now,
        };
        let entry = self
            .store
            .record_skip_failure(&failure, &self.options.backoff())
            .await?;

        warn!(
            %host,
            reason = %kind,
            failure_count = entry.failure_count,
            expires_at = ?entry.expires_at,
            "MX host skip-listed"
        );
        Ok(Some(entry))
    }

    /// A conclusive answer from `host`: forget its strikes and lift any
    /// automatic entry.
    pub async fn record_success(&self, host: &str) -> Result<(), StorageError> {
        let host = normalize_host(host);
        self.strikes.remove(&host);
        if self.store.remove_automatic_skip_entry(&host).await? {
            info!(%host, "MX host recovered, skip entry removed");
        }
        Ok(())
    }

    /// Permanently skip `host` until removed by hand.
    pub async fn add_manual(&self, host: &str, note: Option<String>) -> Result<MxSkipEntry, StorageError> {
        let entry = MxSkipEntry::manual(&normalize_host(host), note, Utc::now());
        self.store.put_skip_entry(entry.clone()).await?;
        info!(host = %entry.host, "manual skip entry added");
        Ok(entry)
    }

    pub async fn remove(&self, host: &str) -> Result<bool, StorageError> {
        let host = normalize_host(host);
        self.strikes.remove(&host);
        self.store.remove_skip_entry(&host).await
    }

    pub async fn list(&self) -> Result<Vec<MxSkipEntry>, StorageError> {
        self.store.list_skip_entries().await
    }

    /// Delete expired automatic rows and stale strike windows.
    pub async fn purge_expired(&self) -> Result<usize, StorageError> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let window = self.options.soft_failure_window();
        self.strikes.retain(|_, hits| {
            hits.retain(|hit| now - *hit <= window);
            !hits.is_empty()
        });

        let purged = self.store.delete_expired_skip_entries(now).await?;
        if purged > 0 {
            info!(purged, "expired MX skip entries removed");
        }
        Ok(purged)
    }

    /// Sweep entrypoint for external schedulers.
    pub async fn cleanup_expired_mx_skip_entries(&self) -> Result<usize, StorageError> {
        self.purge_expired().await
    }

    /// Run [`purge_expired`](Self::purge_expired) every
    /// `sweep_interval_secs` until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancelToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.options.sweep_interval());
            // Skip the first tick to avoid an immediate sweep
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        if let Err(err) = self.purge_expired().await {
                            warn!(error = %err, "skip-list sweep failed");
                        }
                    }
                    () = cancel.cancelled() => {
                        debug!("skip-list sweeper stopped");
                        break;
                    }
                }
            }
        })
    }

    fn add_strike(&self, host: &str, now: DateTime<Utc>) -> bool {
        let window = self.options.soft_failure_window();
        let threshold = self.options.soft_failure_threshold.max(1) as usize;

        let mut hits = self.strikes.entry(host.to_string()).or_default();
        hits.retain(|hit| now - *hit <= window);
        hits.push(now);
        if hits.len() >= threshold {
            hits.clear();
            true
        } else {
            false
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn truncate_response(raw: &str) -> String {
    const MAX: usize = 512;
    let trimmed = raw.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut end = MAX;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
