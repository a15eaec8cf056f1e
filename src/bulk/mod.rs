//! Bulk verification jobs.
//!
//! A job reads its source file, moves `pending -> processing`, verifies every
//! address through a bounded worker pool, persists each result as it lands,
//! and finishes `completed` with a CSV artifact or `failed` with a message.

mod artifact;
mod error;
mod options;
mod source;
mod types;
pub(crate) mod worker;

pub use artifact::{artifact_header, render_csv, write_artifact};
pub use error::JobError;
pub use options::BulkOptions;
pub use source::{SourceEntry, read_source};
pub use types::{BulkJob, CounterKind, JobId, JobStateError, JobStatus, JobTransition};

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::pipeline::{
    CheckPipeline, ResultCode, VerificationRequest, VerificationResult, VerificationState,
};
use crate::storage::{JobStore, ResultStore, StorageError};

use worker::{PoolOptions, ResultSink, WorkItem, run_pool};

#[derive(Debug, Clone, Copy)]
struct Retry {
    attempts: u32,
    backoff: Duration,
}

impl Retry {
    async fn run<T, F, Fut>(self, what: &'static str, mut op: F) -> Result<T, StorageError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StorageError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    attempt += 1;
                    warn!(error = %err, attempt, what, "storage write failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Persists each result, bumps the job counters and keeps the result for the
/// artifact.
struct JobSink<'a> {
    job_id: &'a JobId,
    jobs: &'a dyn JobStore,
    results: &'a dyn ResultStore,
    retry: Retry,
    slots: Vec<Option<VerificationResult>>,
}

#[async_trait]
impl ResultSink for JobSink<'_> {
    type Error = JobError;

    async fn accept(&mut self, index: usize, result: VerificationResult) -> Result<(), JobError> {
        let results = self.results;
        let stored = self
            .retry
            .run("result", || results.insert_result(&result))
            .await;

        let result = match stored {
            Ok(()) => result,
            Err(err) => {
                error!(job_id = %self.job_id, email = %result.address, error = %err, "result not persisted");
                let mut failed = result;
                failed.state = VerificationState::Error;
                failed.result = ResultCode::StorageError;
                failed
            }
        };

        let jobs = self.jobs;
        let job_id = self.job_id;
        let kind = CounterKind::from(result.state);
        self.retry
            .run("counters", || jobs.increment_job_counters(job_id, kind))
            .await?;

        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(result);
        }
        Ok(())
    }
}

/// Runs bulk jobs against a shared [`CheckPipeline`].
pub struct BulkRunner {
    pipeline: Arc<CheckPipeline>,
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    options: BulkOptions,
}

impl std::fmt::Debug for BulkRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkRunner")
            .field("pipeline", &self.pipeline)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BulkRunner {
    pub fn new(
        pipeline: Arc<CheckPipeline>,
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        options: BulkOptions,
    ) -> Self {
        Self {
            pipeline,
            jobs,
            results,
            options,
        }
    }

    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    /// Register a new `pending` job reading from `source`.
    pub async fn create_job(
        &self,
        owner: &str,
        source: impl Into<PathBuf>,
    ) -> Result<BulkJob, JobError> {
        let job = BulkJob::new(JobId::generate(), owner, source);
        self.jobs.insert_job(job.clone()).await?;
        info!(job_id = %job.id, owner, source = %job.source.display(), "bulk job created");
        Ok(job)
    }

    pub async fn job(&self, id: &JobId) -> Result<BulkJob, JobError> {
        self.jobs
            .get_job(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    /// Stored results of a job, in completion order.
    pub async fn results(&self, id: &JobId) -> Result<Vec<VerificationResult>, JobError> {
        Ok(self.results.job_results(id).await?)
    }

    /// Run a `pending` job to completion.
    ///
    /// # Errors
    ///
    /// [`JobError::InvalidState`] if the job is not pending. Every other error
    /// also leaves the job `failed` with the error text as its message.
    pub async fn run(&self, id: &JobId, cancel: &CancelToken) -> Result<BulkJob, JobError> {
        let job = self.job(id).await?;
        if job.status != JobStatus::Pending {
            return Err(JobError::InvalidState {
                id: id.clone(),
                status: job.status,
            });
        }

        match self.process(&job, cancel).await {
            Ok(done) => Ok(done),
            Err(err) => {
                self.fail(id, &err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Run a job on its own task.
    pub fn spawn(
        self: Arc<Self>,
        id: JobId,
        cancel: CancelToken,
    ) -> tokio::task::JoinHandle<Result<BulkJob, JobError>> {
        tokio::spawn(async move { self.run(&id, &cancel).await })
    }

    fn retry(&self) -> Retry {
        Retry {
            attempts: self.options.storage_retries,
            backoff: self.options.storage_retry_backoff(),
        }
    }

    async fn process(&self, job: &BulkJob, cancel: &CancelToken) -> Result<BulkJob, JobError> {
        let entries = read_source(&job.source).await?;
        let total = entries.len() as u64;

        let jobs = self.jobs.as_ref();
        self.retry()
            .run("start", || {
                jobs.transition_job(
                    &job.id,
                    JobTransition::Start {
                        total,
                        at: Utc::now(),
                    },
                )
            })
            .await?;
        info!(job_id = %job.id, total, "bulk job started");

        let mut sink = JobSink {
            job_id: &job.id,
            jobs,
            results: self.results.as_ref(),
            retry: self.retry(),
            slots: vec![None; entries.len()],
        };

        let mut items = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                SourceEntry::Address(address) => items.push(WorkItem {
                    index,
                    request: VerificationRequest::new(address).for_job(job.id.clone()),
                }),
                SourceEntry::Unreadable { record, raw } => {
                    warn!(job_id = %job.id, record, "unreadable source record");
                    let request = VerificationRequest::new(raw).for_job(job.id.clone());
                    let result = VerificationResult::without_checks(
                        &request,
                        VerificationState::Error,
                        ResultCode::UnreadableEntry,
                    );
                    sink.accept(index, result).await?;
                }
            }
        }

        let report = run_pool(
            &self.pipeline,
            items,
            PoolOptions::from(&self.options),
            cancel,
            &mut sink,
        )
        .await?;
        if report.cancelled {
            return Err(JobError::Cancelled);
        }

        let results: Vec<VerificationResult> = sink.slots.into_iter().flatten().collect();
        let artifact = self.options.artifact_dir.join(format!("{}.csv", job.id));
        write_artifact(&artifact, &results).await?;

        let done = self
            .retry()
            .run("complete", || {
                jobs.transition_job(
                    &job.id,
                    JobTransition::Complete {
                        artifact: artifact.clone(),
                        at: Utc::now(),
                    },
                )
            })
            .await?;
        info!(
            job_id = %done.id,
            valid = done.valid_emails,
            invalid = done.invalid_emails,
            risky = done.risky_emails,
            errors = done.error_emails,
            requeued = report.requeued,
            artifact = %artifact.display(),
            "bulk job completed"
        );
        Ok(done)
    }

    async fn fail(&self, id: &JobId, message: &str) {
        let jobs = self.jobs.as_ref();
        let outcome = self
            .retry()
            .run("fail", || {
                jobs.transition_job(
                    id,
                    JobTransition::Fail {
                        message: message.to_string(),
                        at: Utc::now(),
                    },
                )
            })
            .await;
        match outcome {
            Ok(_) => warn!(job_id = %id, message, "bulk job failed"),
            Err(err) => error!(job_id = %id, error = %err, "bulk job could not be marked failed"),
        }
    }
}

#[cfg(test)]
mod tests;
