use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    BlacklistEntry, BlacklistKind, BlacklistStore, JobStore, ResultStore, SkipListStore,
    StorageError,
};
use crate::bulk::{BulkJob, CounterKind, JobId, JobTransition};
use crate::pipeline::VerificationResult;
use crate::skiplist::{BackoffPolicy, MxSkipEntry, SkipFailure};

/// In-process implementation of every storage trait.
///
/// Row-level atomicity comes from `DashMap` entry locks: an upsert holds the
/// shard lock for the whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    jobs: DashMap<JobId, BulkJob>,
    results: RwLock<Vec<VerificationResult>>,
    skip_list: DashMap<String, MxSkipEntry>,
    blacklist: DashMap<(BlacklistKind, String), BlacklistEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load skip-list rows from a JSON snapshot. A missing file is an empty
    /// list.
    pub async fn load_skip_list(&self, path: &Path) -> Result<usize, StorageError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let entries: Vec<MxSkipEntry> = serde_json::from_slice(&bytes)?;
        let count = entries.len();
        for entry in entries {
            self.skip_list.insert(entry.host.clone(), entry);
        }
        debug!(path = %path.display(), count, "loaded skip-list snapshot");
        Ok(count)
    }

    /// Write the skip list as JSON (temp file then rename).
    pub async fn save_skip_list(&self, path: &Path) -> Result<(), StorageError> {
        let mut entries: Vec<MxSkipEntry> = self
            .skip_list
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.host.cmp(&b.host));
        let json = serde_json::to_vec_pretty(&entries)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_result(&self, result: &VerificationResult) -> Result<(), StorageError> {
        self.results.write().push(result.clone());
        Ok(())
    }

    async fn job_results(&self, job_id: &JobId) -> Result<Vec<VerificationResult>, StorageError> {
        Ok(self
            .results
            .read()
            .iter()
            .filter(|result| result.job_id.as_ref() == Some(job_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: BulkJob) -> Result<(), StorageError> {
        match self.jobs.entry(job.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(format!(
                "job {} already exists",
                job.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<BulkJob>, StorageError> {
        Ok(self.jobs.get(job_id).map(|job| job.value().clone()))
    }

    async fn transition_job(
        &self,
        job_id: &JobId,
        transition: JobTransition,
    ) -> Result<BulkJob, StorageError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StorageError::job_not_found(job_id))?;
        job.apply(transition)
            .map_err(|err| StorageError::Conflict(err.to_string()))?;
        Ok(job.clone())
    }

    async fn increment_job_counters(
        &self,
        job_id: &JobId,
        kind: CounterKind,
    ) -> Result<BulkJob, StorageError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| StorageError::job_not_found(job_id))?;
        job.count(kind)
            .map_err(|err| StorageError::Conflict(err.to_string()))?;
        Ok(job.clone())
    }
}

#[async_trait]
impl SkipListStore for MemoryStore {
    async fn get_skip_entry(&self, host: &str) -> Result<Option<MxSkipEntry>, StorageError> {
        Ok(self.skip_list.get(host).map(|entry| entry.value().clone()))
    }

    async fn record_skip_failure(
        &self,
        failure: &SkipFailure,
        policy: &BackoffPolicy,
    ) -> Result<MxSkipEntry, StorageError> {
        let updated = match self.skip_list.entry(failure.host.clone()) {
            Entry::Occupied(mut slot) => {
                let current = slot.get().clone();
                let next = MxSkipEntry::apply_failure(Some(current), failure, policy);
                slot.insert(next.clone());
                next
            }
            Entry::Vacant(slot) => {
                let next = MxSkipEntry::apply_failure(None, failure, policy);
                slot.insert(next.clone());
                next
            }
        };
        Ok(updated)
    }

    async fn put_skip_entry(&self, entry: MxSkipEntry) -> Result<(), StorageError> {
        self.skip_list.insert(entry.host.clone(), entry);
        Ok(())
    }

    async fn remove_skip_entry(&self, host: &str) -> Result<bool, StorageError> {
        Ok(self.skip_list.remove(host).is_some())
    }

    async fn remove_automatic_skip_entry(&self, host: &str) -> Result<bool, StorageError> {
        Ok(self
            .skip_list
            .remove_if(host, |_, entry| !entry.is_manual)
            .is_some())
    }

    async fn delete_expired_skip_entries(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let before = self.skip_list.len();
        self.skip_list.retain(|_, entry| !entry.is_purgeable(now));
        Ok(before.saturating_sub(self.skip_list.len()))
    }

    async fn list_skip_entries(&self) -> Result<Vec<MxSkipEntry>, StorageError> {
        let mut entries: Vec<MxSkipEntry> = self
            .skip_list
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.host.cmp(&b.host));
        Ok(entries)
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn find_blacklisted(
        &self,
        email: &str,
        domain: &str,
    ) -> Result<Option<BlacklistEntry>, StorageError> {
        let email_key = (BlacklistKind::Email, email.to_ascii_lowercase());
        if let Some(entry) = self.blacklist.get(&email_key) {
            return Ok(Some(entry.value().clone()));
        }
        let domain_key = (BlacklistKind::Domain, domain.to_ascii_lowercase());
        Ok(self
            .blacklist
            .get(&domain_key)
            .map(|entry| entry.value().clone()))
    }

    async fn add_blacklisted(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        self.blacklist.insert(entry.key(), entry);
        Ok(())
    }
}
