//! Persistence seams.
//!
//! The engine only talks to storage through these traits. [`MemoryStore`]
//! implements all of them for single-process use and tests; a database
//! backend implements the same traits elsewhere.

mod error;
mod memory;
mod types;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use types::{BlacklistEntry, BlacklistKind};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bulk::{BulkJob, CounterKind, JobId, JobTransition};
use crate::pipeline::VerificationResult;
use crate::skiplist::{BackoffPolicy, MxSkipEntry, SkipFailure};

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn insert_result(&self, result: &VerificationResult) -> Result<(), StorageError>;

    async fn job_results(&self, job_id: &JobId) -> Result<Vec<VerificationResult>, StorageError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: BulkJob) -> Result<(), StorageError>;

    async fn get_job(&self, job_id: &JobId) -> Result<Option<BulkJob>, StorageError>;

    /// Apply a status transition; rejected transitions surface as
    /// [`StorageError::Conflict`].
    async fn transition_job(
        &self,
        job_id: &JobId,
        transition: JobTransition,
    ) -> Result<BulkJob, StorageError>;

    /// Atomically bump `processed_emails` and the counter for `kind`.
    async fn increment_job_counters(
        &self,
        job_id: &JobId,
        kind: CounterKind,
    ) -> Result<BulkJob, StorageError>;
}

#[async_trait]
pub trait SkipListStore: Send + Sync {
    async fn get_skip_entry(&self, host: &str) -> Result<Option<MxSkipEntry>, StorageError>;

    /// Atomic upsert by host: create the row or increment it, computing the
    /// new expiry with `policy` inside the same critical section.
    async fn record_skip_failure(
        &self,
        failure: &SkipFailure,
        policy: &BackoffPolicy,
    ) -> Result<MxSkipEntry, StorageError>;

    async fn put_skip_entry(&self, entry: MxSkipEntry) -> Result<(), StorageError>;

    /// Remove a row whatever its kind. Returns whether a row existed.
    async fn remove_skip_entry(&self, host: &str) -> Result<bool, StorageError>;

    /// Remove a row only if it was not added manually.
    async fn remove_automatic_skip_entry(&self, host: &str) -> Result<bool, StorageError>;

    /// Delete non-manual rows whose expiry is before `now`.
    async fn delete_expired_skip_entries(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;

    async fn list_skip_entries(&self) -> Result<Vec<MxSkipEntry>, StorageError>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Match either the exact address or its whole domain.
    async fn find_blacklisted(
        &self,
        email: &str,
        domain: &str,
    ) -> Result<Option<BlacklistEntry>, StorageError>;

    async fn add_blacklisted(&self, entry: BlacklistEntry) -> Result<(), StorageError>;
}
