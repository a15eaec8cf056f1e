//! Wiring: builds every component from an [`EngineConfig`] and a store.

use std::sync::Arc;

use tracing::info;

use crate::bulk::BulkRunner;
use crate::config::EngineConfig;
use crate::error::VerifyError;
use crate::mx::{LookupMx, MxResolver, system_resolver};
use crate::orchestrator::Verifier;
use crate::pipeline::{CheckPipeline, PipelineComponents};
use crate::ratelimit::SmtpRateLimiter;
use crate::reference::{ReferenceData, ReferenceHandle};
use crate::skiplist::MxSkipList;
use crate::smtp_verify::{MailboxProber, SmtpProber};
use crate::storage::{BlacklistStore, JobStore, MemoryStore, ResultStore, SkipListStore};

/// Storage backends, one per repository trait.
#[derive(Clone)]
pub struct Stores {
    pub results: Arc<dyn ResultStore>,
    pub jobs: Arc<dyn JobStore>,
    pub skip_list: Arc<dyn SkipListStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
}

impl Stores {
    /// Every trait served by the same [`MemoryStore`].
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            results: store.clone(),
            jobs: store.clone(),
            skip_list: store.clone(),
            blacklist: store,
        }
    }
}

/// Fully wired verification engine.
#[derive(Debug, Clone)]
pub struct Engine {
    pub pipeline: Arc<CheckPipeline>,
    pub verifier: Verifier,
    pub bulk: Arc<BulkRunner>,
    pub skip_list: Arc<MxSkipList>,
    pub reference: ReferenceHandle,
}

impl Engine {
    /// Build with the system DNS resolver and the real SMTP prober.
    pub async fn from_config(config: &EngineConfig, stores: Stores) -> Result<Self, VerifyError> {
        let dns: Arc<dyn LookupMx> = Arc::new(system_resolver(&config.dns)?);
        let prober: Arc<dyn MailboxProber> = Arc::new(SmtpProber::new(config.smtp.clone()));
        Self::assemble(config, stores, dns, prober).await
    }

    /// Build around caller-provided DNS and SMTP backends.
    pub async fn assemble(
        config: &EngineConfig,
        stores: Stores,
        dns: Arc<dyn LookupMx>,
        prober: Arc<dyn MailboxProber>,
    ) -> Result<Self, VerifyError> {
        let reference = match &config.reference.dir {
            Some(dir) => {
                let data = ReferenceData::load_dir(dir).await?;
                info!(dir = %dir.display(), "reference lists loaded");
                ReferenceHandle::new(data)
            }
            None => ReferenceHandle::default(),
        };

        let skip_list = Arc::new(MxSkipList::new(stores.skip_list, config.skip_list.clone()));
        let components = PipelineComponents {
            resolver: Arc::new(MxResolver::new(dns, config.dns.clone())),
            skip_list: skip_list.clone(),
            limiter: Arc::new(SmtpRateLimiter::new(config.rate_limit.clone())),
            prober,
            reference: reference.clone(),
            blacklist: stores.blacklist,
        };
        let pipeline = Arc::new(CheckPipeline::new(
            components,
            config.pipeline.clone(),
            &config.smtp,
        ));

        let verifier = Verifier::new(pipeline.clone(), &config.bulk);
        let bulk = Arc::new(BulkRunner::new(
            pipeline.clone(),
            stores.jobs,
            stores.results,
            config.bulk.clone(),
        ));

        Ok(Self {
            pipeline,
            verifier,
            bulk,
            skip_list,
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mx::tests::StubResolver;
    use crate::pipeline::VerificationState;
    use crate::pipeline::tests::ScriptedProber;
    use crate::smtp_verify::ProbeOutcome;

    #[tokio::test]
    async fn assembled_engine_verifies_and_loads_lists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(crate::reference::DISPOSABLE_FILE),
            "# local list\nthrowaway.test\n",
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.reference.dir = Some(dir.path().to_path_buf());
        config.dns.retry_backoff_ms = 0;

        let store = Arc::new(MemoryStore::new());
        let engine = Engine::assemble(
            &config,
            Stores::memory(store),
            Arc::new(StubResolver::single_mx()),
            Arc::new(ScriptedProber::always(ProbeOutcome::Accepted)),
        )
        .await
        .unwrap();

        assert!(engine.reference.snapshot().is_disposable("throwaway.test"));
        let ok = engine.pipeline.evaluate("alice@example.com").await;
        assert_eq!(ok.state, VerificationState::Deliverable);
        let disposable = engine.pipeline.evaluate("alice@throwaway.test").await;
        assert_eq!(disposable.state, VerificationState::Risky);
    }
}
