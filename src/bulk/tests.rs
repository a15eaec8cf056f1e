#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;

use super::*;
use crate::pipeline::tests::{HarnessBuilder, ScriptedProber};
use crate::smtp_verify::{ProbeOutcome, SmtpProbeResult};
use crate::storage::MemoryStore;

/// Accepts `ok*`, rejects `bad*`, answers transient otherwise.
fn by_prefix() -> ScriptedProber {
    ScriptedProber::new(|host, email| {
        let outcome = if email.local.starts_with("ok") {
            ProbeOutcome::Accepted
        } else if email.local.starts_with("bad") {
            ProbeOutcome::Rejected
        } else {
            ProbeOutcome::Transient
        };
        Ok(SmtpProbeResult::new(host, outcome))
    })
}

fn options(dir: &Path) -> BulkOptions {
    BulkOptions {
        workers: 4,
        storage_retry_backoff_ms: 0,
        artifact_dir: dir.join("artifacts"),
        ..BulkOptions::default()
    }
}

fn write_source(dir: &Path, body: &[u8]) -> PathBuf {
    let path = dir.join("source.csv");
    std::fs::write(&path, body).unwrap();
    path
}

struct Setup {
    runner: BulkRunner,
    store: Arc<MemoryStore>,
}

fn setup(prober: ScriptedProber, rate_limit: Option<(u32, u64)>, options: BulkOptions) -> Setup {
    let mut builder = HarnessBuilder::new(prober);
    if let Some((max, window)) = rate_limit {
        builder = builder.rate_limit(max, window);
    }
    let harness = builder.build();
    let store = harness.store.clone();
    let runner = BulkRunner::new(harness.pipeline, store.clone(), store.clone(), options);
    Setup { runner, store }
}

#[tokio::test]
async fn job_runs_to_completion_with_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        b"name,email\nA,ok.alice@example.com\nB,bad.bob@example.com\nC,carol@example.com\nD,not-an-address\n",
    );
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let done = s.runner.run(&job.id, &CancelToken::new()).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_emails, 4);
    assert_eq!(done.processed_emails, 4);
    assert_eq!(done.valid_emails, 1);
    assert_eq!(done.invalid_emails, 2);
    assert_eq!(done.risky_emails, 1);
    assert_eq!(done.error_emails, 0);
    assert!(done.counters_consistent());
    assert!(done.started_at.is_some() && done.completed_at.is_some());

    let stored = s.runner.results(&job.id).await.unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|result| result.job_id.as_ref() == Some(&job.id)));

    let artifact = done.artifact.expect("artifact path");
    assert_eq!(artifact, dir.path().join("artifacts").join(format!("{}.csv", job.id)));
    let body = std::fs::read_to_string(&artifact).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 5);
    insta::assert_snapshot!(
        lines[0],
        @"email,state,result,score,did_you_mean,syntax,mx_record,smtp,disposable,role,no_reply,typo_domain,mailbox_full,is_free,blacklist,domain_validity,isp_esp,government_tld,ai_analysis,mx_host,verified_at"
    );
    // Artifact rows keep source order.
    assert!(lines[1].starts_with("ok.alice@example.com,deliverable,accepted,"));
    assert!(lines[2].starts_with("bad.bob@example.com,undeliverable,mailbox_not_found,"));
    assert!(lines[3].starts_with("carol@example.com,unknown,smtp_unavailable,"));
    assert!(lines[4].starts_with("not-an-address,undeliverable,syntax_error,"));
}

#[tokio::test]
async fn unreadable_records_count_as_errors() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.one@example.com\nok\xFF.two@example.com\nok.three@example.com\n");
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    let done = s.runner.run(&job.id, &CancelToken::new()).await.unwrap();
    assert_eq!(done.total_emails, 3);
    assert_eq!(done.valid_emails, 2);
    assert_eq!(done.error_emails, 1);

    let stored = s.runner.results(&job.id).await.unwrap();
    let unreadable = stored
        .iter()
        .find(|result| result.result == ResultCode::UnreadableEntry)
        .expect("unreadable entry stored");
    assert_eq!(unreadable.state, VerificationState::Error);
    assert_eq!(unreadable.score, 0);
}

#[tokio::test]
async fn missing_source_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", dir.path().join("absent.csv")).await.unwrap();
    let err = s.runner.run(&job.id, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, JobError::Source { .. }));

    let failed = s.runner.job(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.unwrap().contains("absent.csv"));
    assert!(failed.artifact.is_none());
}

#[tokio::test]
async fn only_pending_jobs_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.alice@example.com\n");
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    s.runner.run(&job.id, &CancelToken::new()).await.unwrap();

    let again = s.runner.run(&job.id, &CancelToken::new()).await.unwrap_err();
    assert!(matches!(
        again,
        JobError::InvalidState { status: JobStatus::Completed, .. }
    ));

    let unknown = s.runner.run(&JobId::new("job_missing"), &CancelToken::new()).await;
    assert!(matches!(unknown, Err(JobError::NotFound(_))));
}

#[tokio::test]
async fn empty_source_completes_with_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"");
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    let done = s.runner.run(&job.id, &CancelToken::new()).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total_emails, 0);
    let body = std::fs::read_to_string(done.artifact.unwrap()).unwrap();
    assert_eq!(body.lines().count(), 1);
}

#[tokio::test]
async fn exhausted_rate_limit_ends_as_risky() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.a@example.com\nok.b@example.com\nok.c@example.com\n");
    let opts = BulkOptions {
        max_requeue_passes: 1,
        max_requeue_wait_secs: 0,
        ..options(dir.path())
    };
    let s = setup(by_prefix(), Some((1, 3600)), opts);

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    let done = s.runner.run(&job.id, &CancelToken::new()).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.valid_emails, 1);
    assert_eq!(done.risky_emails, 2);

    let stored = s.runner.results(&job.id).await.unwrap();
    let limited = stored
        .iter()
        .filter(|result| result.result == ResultCode::RateLimited)
        .count();
    assert_eq!(limited, 2);
}

#[tokio::test]
async fn rate_limited_addresses_are_retried_after_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.a@example.com\nok.b@example.com\n");
    let opts = BulkOptions {
        max_requeue_passes: 3,
        max_requeue_wait_secs: 2,
        ..options(dir.path())
    };
    let s = setup(by_prefix(), Some((1, 1)), opts);

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    let done = s.runner.run(&job.id, &CancelToken::new()).await.unwrap();
    assert_eq!(done.valid_emails, 2);
    assert_eq!(done.risky_emails, 0);
}

#[tokio::test]
async fn cancelled_job_is_failed() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.a@example.com\nok.b@example.com\n");
    let s = setup(by_prefix(), None, options(dir.path()));

    let job = s.runner.create_job("owner-1", &source).await.unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = s.runner.run(&job.id, &cancel).await.unwrap_err();
    assert!(matches!(err, JobError::Cancelled));

    let failed = s.runner.job(&job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("job cancelled"));
    assert_eq!(failed.processed_emails, 0);
}

/// Result store failing its first `failures` writes.
struct FlakyResults {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
}

#[async_trait]
impl ResultStore for FlakyResults {
    async fn insert_result(&self, result: &VerificationResult) -> Result<(), StorageError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(StorageError::Unavailable("connection reset".into()));
        }
        self.inner.insert_result(result).await
    }

    async fn job_results(&self, job_id: &JobId) -> Result<Vec<VerificationResult>, StorageError> {
        self.inner.job_results(job_id).await
    }
}

async fn run_with_flaky_results(failures: usize, retries: u32) -> (BulkJob, Vec<VerificationResult>) {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.alice@example.com\n");
    let harness = HarnessBuilder::new(by_prefix()).build();
    let results = Arc::new(FlakyResults {
        inner: harness.store.clone(),
        failures: AtomicUsize::new(failures),
    });
    let opts = BulkOptions {
        workers: 1,
        storage_retries: retries,
        ..options(dir.path())
    };
    let runner = BulkRunner::new(harness.pipeline, harness.store.clone(), results, opts);

    let job = runner.create_job("owner-1", &source).await.unwrap();
    let done = runner.run(&job.id, &CancelToken::new()).await.unwrap();
    let body = std::fs::read_to_string(done.artifact.as_ref().unwrap()).unwrap();
    assert_eq!(body.lines().count(), 2);
    let stored = harness.store.job_results(&job.id).await.unwrap();
    (done, stored)
}

#[tokio::test]
async fn transient_storage_failures_are_retried() {
    let (done, stored) = run_with_flaky_results(2, 3).await;
    assert_eq!(done.valid_emails, 1);
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn unpersisted_result_counts_as_storage_error() {
    let (done, stored) = run_with_flaky_results(1, 0).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.error_emails, 1);
    assert_eq!(done.valid_emails, 0);
    assert!(stored.is_empty());
}

/// Poll until `processed_emails` reaches `target`, checking every read.
async fn progress_to(runner: &BulkRunner, id: &JobId, target: u64, last: &mut u64) -> BulkJob {
    for _ in 0..500 {
        let job = runner.job(id).await.unwrap();
        assert!(job.counters_consistent(), "{job:?}");
        assert!(job.processed_emails >= *last, "counters went back: {job:?}");
        *last = job.processed_emails;
        if job.processed_emails >= target {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached {target} processed addresses");
}

#[tokio::test]
async fn counters_grow_while_the_job_runs() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(
        dir.path(),
        b"ok.a@example.com\nbad.b@example.com\nok.c@example.com\nd@example.com\nok.e@example.com\nbad.f@example.com\n",
    );
    let gate = Arc::new(Semaphore::new(0));
    let opts = BulkOptions {
        workers: 2,
        ..options(dir.path())
    };
    let s = setup(by_prefix().gated(gate.clone()), None, opts);
    let runner = Arc::new(s.runner);

    let job = runner.create_job("owner-1", &source).await.unwrap();
    let handle = Arc::clone(&runner).spawn(job.id.clone(), CancelToken::new());

    let mut last = 0;
    gate.add_permits(2);
    let interim = progress_to(&runner, &job.id, 2, &mut last).await;
    assert_eq!(interim.status, JobStatus::Processing);
    assert_eq!(interim.total_emails, 6);
    assert_eq!(interim.processed_emails, 2);
    assert!(interim.completed_at.is_none());

    gate.add_permits(2);
    let interim = progress_to(&runner, &job.id, 4, &mut last).await;
    assert!(interim.processed_emails > 0 && interim.processed_emails < 6);
    assert_eq!(interim.status, JobStatus::Processing);

    gate.add_permits(2);
    let done = handle.await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.processed_emails, 6);
    assert!(done.processed_emails >= last);
    assert_eq!((done.valid_emails, done.invalid_emails, done.risky_emails), (3, 2, 1));
    assert!(done.counters_consistent());
}

#[tokio::test]
async fn spawned_job_reports_through_its_handle() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), b"ok.alice@example.com\nbad.bob@example.com\n");
    let s = setup(by_prefix(), None, options(dir.path()));
    let runner = Arc::new(s.runner);

    let job = runner.create_job("owner-1", &source).await.unwrap();
    let done = Arc::clone(&runner)
        .spawn(job.id.clone(), CancelToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(s.store.job_results(&job.id).await.unwrap().len(), 2);
}
