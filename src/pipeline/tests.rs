#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::*;
use crate::mx::tests::StubResolver;
use crate::mx::{DnsOptions, LookupFailure, MxRecord};
use crate::ratelimit::RateLimitOptions;
use crate::reference::{ReferenceData, ReferenceHandle};
use crate::skiplist::SkipListOptions;
use crate::smtp_verify::SmtpProbeResult;
use crate::storage::{BlacklistEntry, MemoryStore};

type ProbeFn = dyn Fn(&str, &NormalizedEmail) -> Result<SmtpProbeResult, SmtpProbeError> + Send + Sync;

/// Prober answering from a closure, remembering which hosts it was asked.
pub(crate) struct ScriptedProber {
    script: Box<ProbeFn>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    pub hosts: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&str, &NormalizedEmail) -> Result<SmtpProbeResult, SmtpProbeError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            gate: None,
            hosts: Mutex::new(Vec::new()),
        }
    }

    /// Every probe first consumes one permit of `gate`.
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Every host answers with `outcome`.
    pub(crate) fn always(outcome: ProbeOutcome) -> Self {
        Self::new(move |host, _| Ok(SmtpProbeResult::new(host, outcome)))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxProber for ScriptedProber {
    async fn probe(
        &self,
        mx_host: &str,
        _mail_from_domain: &str,
        candidate: &NormalizedEmail,
    ) -> Result<SmtpProbeResult, SmtpProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().push(mx_host.to_string());
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        (self.script)(mx_host, candidate)
    }
}

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub skip_list: Arc<MxSkipList>,
    pub resolver: Arc<StubResolver>,
    pub prober: Arc<ScriptedProber>,
    pub pipeline: Arc<CheckPipeline>,
}

pub(crate) struct HarnessBuilder {
    resolver: StubResolver,
    prober: ScriptedProber,
    rate_limit: RateLimitOptions,
    options: PipelineOptions,
}

impl HarnessBuilder {
    pub(crate) fn new(prober: ScriptedProber) -> Self {
        Self {
            resolver: StubResolver::single_mx(),
            prober,
            rate_limit: RateLimitOptions::default(),
            options: PipelineOptions::default(),
        }
    }

    pub(crate) fn resolver(mut self, resolver: StubResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub(crate) fn rate_limit(mut self, max_attempts: u32, window_secs: u64) -> Self {
        self.rate_limit = RateLimitOptions {
            max_attempts,
            window_secs,
            ..RateLimitOptions::default()
        };
        self
    }

    pub(crate) fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn build(self) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(self.resolver);
        let prober = Arc::new(self.prober);
        let skip_list = Arc::new(MxSkipList::new(store.clone(), SkipListOptions::default()));
        let dns = DnsOptions {
            retry_backoff_ms: 0,
            ..DnsOptions::default()
        };
        let components = PipelineComponents {
            resolver: Arc::new(MxResolver::new(resolver.clone(), dns)),
            skip_list: skip_list.clone(),
            limiter: Arc::new(SmtpRateLimiter::new(self.rate_limit)),
            prober: prober.clone(),
            reference: ReferenceHandle::new(ReferenceData::builtin()),
            blacklist: store.clone(),
        };
        let pipeline = CheckPipeline::new(components, self.options, &SmtpProbeOptions::default());
        Harness {
            store,
            skip_list,
            resolver,
            prober,
            pipeline: Arc::new(pipeline),
        }
    }
}

fn two_mx() -> StubResolver {
    StubResolver::new(
        |domain| {
            Ok(vec![
                MxRecord::new(20, format!("mx2.{domain}")),
                MxRecord::new(10, format!("mx1.{domain}")),
            ])
        },
        |_| Ok(true),
    )
}

#[tokio::test]
async fn accepted_address_is_deliverable_with_full_score() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();

    let result = h.pipeline.evaluate("alice@example.com").await;
    assert_eq!(result.state, VerificationState::Deliverable);
    assert_eq!(result.result, ResultCode::Accepted);
    assert_eq!(result.score, 100);
    assert_eq!(result.mx_host.as_deref(), Some("mx.example.com"));
    assert!(result.flags.syntax && result.flags.domain_validity);
    assert!(result.flags.mx_record && result.flags.smtp);
    assert!(!result.flags.ai_analysis);
}

#[tokio::test]
async fn syntax_failure_makes_no_network_calls() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();

    for address in ["not-an-address", "a@@example.com", "bad local@example.com"] {
        let result = h.pipeline.evaluate(address).await;
        assert_eq!(result.state, VerificationState::Undeliverable, "{address}");
        assert_eq!(result.result, ResultCode::SyntaxError);
        assert!(!result.flags.syntax);
        assert_eq!(result.score, 0);
    }
    assert_eq!(h.resolver.calls(), 0);
    assert_eq!(h.prober.calls(), 0);
}

#[tokio::test]
async fn unknown_domain_is_undeliverable() {
    let resolver = StubResolver::new(|_| Err(LookupFailure::NxDomain), |_| Ok(false));
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(resolver)
        .build();

    let result = h.pipeline.evaluate("bob@no-such-domain.test").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result, ResultCode::DomainNotFound);
    assert!(!result.flags.domain_validity);
    assert_eq!(h.prober.calls(), 0);
}

#[tokio::test]
async fn dns_failure_is_unknown() {
    let resolver = StubResolver::new(|_| Err(LookupFailure::Timeout), |_| Ok(true));
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(resolver)
        .build();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Unknown);
    assert_eq!(result.result, ResultCode::DnsError);
}

#[tokio::test]
async fn disposable_follows_policy_and_skips_smtp() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();
    let result = h.pipeline.evaluate("temp@mailinator.com").await;
    assert_eq!(result.state, VerificationState::Risky);
    assert_eq!(result.result, ResultCode::Disposable);
    assert!(result.flags.disposable);

    let strict = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .options(PipelineOptions {
            disposable_policy: DisposablePolicy::Undeliverable,
            ..PipelineOptions::default()
        })
        .build();
    let result = strict.pipeline.evaluate("temp@mailinator.com").await;
    assert_eq!(result.state, VerificationState::Undeliverable);

    assert_eq!(h.prober.calls() + strict.prober.calls(), 0);
}

#[tokio::test]
async fn disposable_flag_survives_missing_domain() {
    let resolver = StubResolver::new(|_| Err(LookupFailure::NxDomain), |_| Ok(false));
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(resolver)
        .build();

    let result = h.pipeline.evaluate("temp@mailinator.com").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result, ResultCode::DomainNotFound);
    assert!(result.flags.disposable);
    assert!(!result.flags.domain_validity);
}

#[tokio::test]
async fn blacklist_reason_becomes_result_code() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();
    h.store
        .add_blacklisted(BlacklistEntry::email("Trap@Example.com", "spamtrap"))
        .await
        .unwrap();
    h.store
        .add_blacklisted(BlacklistEntry::domain("complaints.test", "complainer"))
        .await
        .unwrap();

    let result = h.pipeline.evaluate("trap@example.com").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result.as_str(), "spamtrap");
    assert!(result.flags.blacklist);

    let result = h.pipeline.evaluate("anyone@complaints.test").await;
    assert_eq!(result.result.as_str(), "complainer");
    assert_eq!(h.prober.calls(), 0);
}

#[tokio::test]
async fn blacklist_reason_named_like_a_code_stays_a_blacklist_hit() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();
    h.store
        .add_blacklisted(BlacklistEntry::domain("reseller.test", "disposable"))
        .await
        .unwrap();

    let result = h.pipeline.evaluate("someone@reseller.test").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result.as_str(), "blacklisted:disposable");
    assert!(matches!(result.result, ResultCode::Blacklisted(_)));
    assert!(!result.flags.disposable);
}

#[tokio::test]
async fn null_mx_is_undeliverable() {
    let resolver = StubResolver::new(|_| Ok(vec![MxRecord::new(0, "")]), |_| Ok(true));
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(resolver)
        .build();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result, ResultCode::NoMxRecord);
    assert!(!result.flags.mx_record);
    assert_eq!(h.prober.calls(), 0);
}

#[tokio::test]
async fn implicit_route_probes_the_domain_itself() {
    let resolver = StubResolver::new(|_| Err(LookupFailure::NoRecords), |_| Ok(true));
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(resolver)
        .build();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Deliverable);
    assert!(!result.flags.mx_record);
    assert!(result.flags.domain_validity);
    assert_eq!(h.prober.hosts.lock().as_slice(), ["example.com"]);
    assert!(result.score < 100);
}

#[tokio::test]
async fn catch_all_stays_deliverable_with_lower_score() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::CatchAllSuspected)).build();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Deliverable);
    assert_eq!(result.result, ResultCode::AcceptedCatchAll);
    assert_eq!(result.score, 100 - Penalty::CatchAll.weight());
}

#[tokio::test]
async fn rejected_mailbox_is_undeliverable() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Rejected)).build();

    let result = h.pipeline.evaluate("ghost@example.com").await;
    assert_eq!(result.state, VerificationState::Undeliverable);
    assert_eq!(result.result, ResultCode::MailboxNotFound);
    assert!(!result.flags.smtp);
    assert!(!h.skip_list.is_skipped("mx.example.com").await.unwrap());
}

#[tokio::test]
async fn role_and_no_reply_cap_at_risky() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();

    let role = h.pipeline.evaluate("support@example.com").await;
    assert_eq!(role.state, VerificationState::Risky);
    assert_eq!(role.result, ResultCode::RoleAccount);
    assert!(role.flags.role && role.flags.smtp);

    let no_reply = h.pipeline.evaluate("no-reply@example.com").await;
    assert_eq!(no_reply.state, VerificationState::Risky);
    assert_eq!(no_reply.result, ResultCode::NoReply);
}

#[tokio::test]
async fn free_and_government_are_flags_only() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();

    let free = h.pipeline.evaluate("someone@gmail.com").await;
    assert_eq!(free.state, VerificationState::Deliverable);
    assert!(free.flags.is_free);
    assert_eq!(free.score, 100);

    let gov = h.pipeline.evaluate("someone@agency.gouv.fr").await;
    assert_eq!(gov.state, VerificationState::Deliverable);
    assert!(gov.flags.government_tld);
}

#[tokio::test]
async fn typo_domain_suggests_correction() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();

    let result = h.pipeline.evaluate("bob@gmial.com").await;
    assert!(result.flags.typo_domain);
    assert_eq!(result.did_you_mean.as_deref(), Some("bob@gmail.com"));
    assert_eq!(result.score, 100 - Penalty::Typo.weight());
}

#[tokio::test]
async fn mailbox_full_is_risky() {
    let prober = ScriptedProber::new(|host, _| {
        let mut probe = SmtpProbeResult::new(host, ProbeOutcome::Transient);
        probe.mailbox_full = true;
        Ok(probe)
    });
    let h = HarnessBuilder::new(prober).resolver(two_mx()).build();

    let result = h.pipeline.evaluate("full@example.com").await;
    assert_eq!(result.state, VerificationState::Risky);
    assert_eq!(result.result, ResultCode::MailboxFull);
    assert!(result.flags.mailbox_full);
    assert_eq!(h.prober.calls(), 1, "mailbox full stops the host walk");
}

#[tokio::test]
async fn anti_abuse_skip_lists_host_for_later_addresses() {
    let prober = ScriptedProber::new(|host, _| {
        let mut probe = SmtpProbeResult::new(host, ProbeOutcome::Transient);
        probe.anti_abuse = true;
        Ok(probe)
    });
    let h = HarnessBuilder::new(prober).build();

    let first = h.pipeline.evaluate("a@example.com").await;
    assert_eq!(first.state, VerificationState::Unknown);
    assert_eq!(first.result, ResultCode::SmtpUnavailable);
    assert!(h.skip_list.is_skipped("mx.example.com").await.unwrap());

    let second = h.pipeline.evaluate("b@example.com").await;
    assert_eq!(second.state, VerificationState::Unknown);
    assert_eq!(second.result, ResultCode::MxSkipped);
    assert_eq!(h.prober.calls(), 1);
}

#[tokio::test]
async fn skip_listed_primary_falls_through_to_backup() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .resolver(two_mx())
        .build();
    h.skip_list.add_manual("mx1.example.com", None).await.unwrap();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Deliverable);
    assert_eq!(result.mx_host.as_deref(), Some("mx2.example.com"));
    assert_eq!(h.prober.hosts.lock().as_slice(), ["mx2.example.com"]);
}

#[tokio::test]
async fn hosts_are_tried_in_preference_order() {
    let prober = ScriptedProber::new(|host, _| {
        let outcome = if host.starts_with("mx1.") {
            ProbeOutcome::ConnectionFailed
        } else {
            ProbeOutcome::Rejected
        };
        Ok(SmtpProbeResult::new(host, outcome))
    });
    let h = HarnessBuilder::new(prober).resolver(two_mx()).build();

    let result = h.pipeline.evaluate("ghost@example.com").await;
    assert_eq!(result.result, ResultCode::MailboxNotFound);
    assert_eq!(
        h.prober.hosts.lock().as_slice(),
        ["mx1.example.com", "mx2.example.com"]
    );
    assert!(h.skip_list.is_skipped("mx1.example.com").await.unwrap());
}

#[tokio::test]
async fn single_timeout_does_not_skip_list() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Timeout)).build();

    let result = h.pipeline.evaluate("slow@example.com").await;
    assert_eq!(result.state, VerificationState::Unknown);
    assert_eq!(result.result, ResultCode::SmtpUnavailable);
    assert!(!h.skip_list.is_skipped("mx.example.com").await.unwrap());
}

#[tokio::test]
async fn protocol_errors_skip_list_the_host() {
    let prober = ScriptedProber::new(|host, _| {
        Err(SmtpProbeError::Protocol {
            host: host.to_string(),
            message: "invalid reply code".into(),
        })
    });
    let h = HarnessBuilder::new(prober).build();

    let result = h.pipeline.evaluate("bob@example.com").await;
    assert_eq!(result.state, VerificationState::Unknown);
    assert!(result.smtp_response.unwrap().contains("invalid reply code"));
    let entries = h.skip_list.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, FailureKind::ProtocolError);
}

#[tokio::test]
async fn conclusive_answer_lifts_automatic_entry() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();
    let past = Utc::now() - chrono::TimeDelta::hours(2);
    h.skip_list
        .record_failure_at("mx.example.com", FailureKind::ConnectionRefused, None, past)
        .await
        .unwrap();
    assert!(!h.skip_list.is_skipped("mx.example.com").await.unwrap());

    h.pipeline.evaluate("bob@example.com").await;
    assert!(h.skip_list.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn rate_limit_defers_or_reports() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted))
        .rate_limit(1, 600)
        .build();

    let first = h.pipeline.evaluate("a@example.com").await;
    assert_eq!(first.state, VerificationState::Deliverable);

    let request = VerificationRequest::new("b@example.com");
    let limit = h.pipeline.evaluate_deferrable(&request).await.unwrap_err();
    assert_eq!(limit.domain, "example.com");
    assert!(limit.retry_after_secs >= 1);

    let reported = h.pipeline.evaluate_request(&request).await;
    assert_eq!(reported.state, VerificationState::Unknown);
    assert_eq!(reported.result, ResultCode::RateLimited);
    assert!(reported.flags.syntax, "earlier stages still recorded");
    assert_eq!(h.prober.calls(), 1);
}

#[tokio::test]
async fn request_metadata_is_carried_through() {
    let h = HarnessBuilder::new(ScriptedProber::always(ProbeOutcome::Accepted)).build();
    let request = VerificationRequest::new("  alice@Example.com ")
        .with_source("signup-form")
        .for_job(crate::bulk::JobId::new("job_test"));

    let result = h.pipeline.evaluate_request(&request).await;
    assert_eq!(result.address, "alice@Example.com");
    assert_eq!(result.domain, "example.com");
    assert_eq!(result.source.as_deref(), Some("signup-form"));
    assert_eq!(result.job_id.as_ref().map(|id| id.as_str()), Some("job_test"));
}
