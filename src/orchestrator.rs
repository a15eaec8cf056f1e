//! Single and batch verification on top of the shared worker pool.

use std::sync::Arc;

use crate::bulk::BulkOptions;
use crate::bulk::worker::{Collector, PoolOptions, WorkItem, run_pool};
use crate::cancel::CancelToken;
use crate::pipeline::{
    CheckPipeline, ResultCode, VerificationRequest, VerificationResult, VerificationState,
};

/// Entry point for interactive verification.
///
/// Requests go through the same pool as bulk jobs, so concurrency, requeue
/// passes and the rate-limit contract are identical.
#[derive(Debug, Clone)]
pub struct Verifier {
    pipeline: Arc<CheckPipeline>,
    pool: PoolOptions,
}

impl Verifier {
    pub fn new(pipeline: Arc<CheckPipeline>, options: &BulkOptions) -> Self {
        Self {
            pipeline,
            pool: PoolOptions::from(options),
        }
    }

    pub fn pipeline(&self) -> &Arc<CheckPipeline> {
        &self.pipeline
    }

    pub async fn verify(&self, request: VerificationRequest) -> VerificationResult {
        let fallback = request.clone();
        self.verify_requests(vec![request], &CancelToken::new())
            .await
            .pop()
            .unwrap_or_else(|| cancelled(&fallback))
    }

    /// Verify `addresses`; results come back in input order.
    pub async fn verify_batch<I, S>(&self, addresses: I) -> Vec<VerificationResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requests = addresses.into_iter().map(VerificationRequest::new).collect();
        self.verify_requests(requests, &CancelToken::new()).await
    }

    /// Verify `requests` until done or cancelled. Requests never started
    /// come back as `error` / `cancelled`.
    pub async fn verify_requests(
        &self,
        requests: Vec<VerificationRequest>,
        cancel: &CancelToken,
    ) -> Vec<VerificationResult> {
        let items = requests
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, request)| WorkItem { index, request })
            .collect();

        let mut collector = Collector::new(requests.len());
        // Collector::Error is Infallible.
        let _ = run_pool(&self.pipeline, items, self.pool, cancel, &mut collector).await;
        collector.into_results(|index| cancelled(&requests[index]))
    }
}

fn cancelled(request: &VerificationRequest) -> VerificationResult {
    VerificationResult::without_checks(request, VerificationState::Error, ResultCode::Cancelled)
}
