//! Bounded worker pool shared by bulk jobs and batch verification.
//!
//! Each pass runs every queued address with at most `workers` verifications
//! in flight. Addresses hitting the SMTP rate limit are deferred to the next
//! pass; the last pass evaluates without deferral, so a still-limited
//! address ends as `unknown` / `rate_limited`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::pipeline::{
    CheckPipeline, ResultCode, VerificationRequest, VerificationResult, VerificationState,
};

use super::BulkOptions;

#[derive(Debug, Clone)]
pub(crate) struct WorkItem {
    pub index: usize,
    pub request: VerificationRequest,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PoolOptions {
    pub workers: usize,
    pub max_requeue_passes: u32,
    pub max_requeue_wait: Duration,
}

impl From<&BulkOptions> for PoolOptions {
    fn from(options: &BulkOptions) -> Self {
        Self {
            workers: options.workers.max(1),
            max_requeue_passes: options.max_requeue_passes,
            max_requeue_wait: options.max_requeue_wait(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PoolReport {
    pub completed: usize,
    pub requeued: usize,
    pub cancelled: bool,
}

/// Receives finished results on the collector side, one at a time.
#[async_trait]
pub(crate) trait ResultSink: Send {
    type Error: Send;

    async fn accept(&mut self, index: usize, result: VerificationResult) -> Result<(), Self::Error>;
}

/// Run `items` through `pipeline`.
///
/// Cancellation stops spawning; verifications already running finish and are
/// delivered. A sink error stops the pool and aborts in-flight work.
pub(crate) async fn run_pool<S>(
    pipeline: &Arc<CheckPipeline>,
    items: Vec<WorkItem>,
    options: PoolOptions,
    cancel: &CancelToken,
    sink: &mut S,
) -> Result<PoolReport, S::Error>
where
    S: ResultSink,
{
    let workers = options.workers.max(1);
    let mut report = PoolReport::default();
    let mut queue = items;

    for pass in 0..=options.max_requeue_passes {
        if queue.is_empty() {
            break;
        }
        let final_pass = pass == options.max_requeue_passes;
        debug!(pass, queued = queue.len(), final_pass, "verification pass started");

        let mut pending = queue.into_iter();
        let mut in_flight: HashMap<usize, VerificationRequest> = HashMap::new();
        let mut deferred: Vec<WorkItem> = Vec::new();
        let mut wait: Option<Duration> = None;
        let mut join_set = JoinSet::new();

        loop {
            while join_set.len() < workers && !cancel.is_cancelled() {
                let Some(item) = pending.next() else { break };
                in_flight.insert(item.index, item.request.clone());
                let pipeline = Arc::clone(pipeline);
                join_set.spawn(async move {
                    let outcome = if final_pass {
                        Ok(pipeline.evaluate_request(&item.request).await)
                    } else {
                        pipeline.evaluate_deferrable(&item.request).await
                    };
                    (item.index, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, Ok(result))) => {
                    in_flight.remove(&index);
                    if let Err(err) = sink.accept(index, result).await {
                        join_set.shutdown().await;
                        return Err(err);
                    }
                    report.completed += 1;
                }
                Ok((index, Err(limit))) => {
                    if let Some(request) = in_flight.remove(&index) {
                        let retry_after = limit.retry_after();
                        wait = Some(wait.map_or(retry_after, |current| current.min(retry_after)));
                        deferred.push(WorkItem { index, request });
                    }
                }
                Err(err) => error!(error = %err, "verification task failed"),
            }
        }

        // Tasks that panicked never reported back.
        for (index, request) in in_flight.drain() {
            let result = VerificationResult::without_checks(
                &request,
                VerificationState::Error,
                ResultCode::InternalError,
            );
            sink.accept(index, result).await?;
            report.completed += 1;
        }

        if cancel.is_cancelled() {
            info!(completed = report.completed, "verification pool cancelled");
            report.cancelled = true;
            return Ok(report);
        }

        if deferred.is_empty() {
            break;
        }
        deferred.sort_by_key(|item| item.index);
        report.requeued += deferred.len();
        let delay = wait.unwrap_or_default().min(options.max_requeue_wait);
        info!(
            deferred = deferred.len(),
            delay_ms = delay.as_millis() as u64,
            next_pass = pass + 1,
            "rate-limited addresses requeued"
        );
        queue = deferred;

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
        }
    }

    Ok(report)
}

/// Sink collecting results by input position.
#[derive(Debug)]
pub(crate) struct Collector {
    slots: Vec<Option<VerificationResult>>,
}

impl Collector {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Results in input order; `fill` supplies the ones never delivered.
    pub fn into_results<F>(self, mut fill: F) -> Vec<VerificationResult>
    where
        F: FnMut(usize) -> VerificationResult,
    {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| fill(index)))
            .collect()
    }
}

#[async_trait]
impl ResultSink for Collector {
    type Error = std::convert::Infallible;

    async fn accept(&mut self, index: usize, result: VerificationResult) -> Result<(), Self::Error> {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(result);
        }
        Ok(())
    }
}
