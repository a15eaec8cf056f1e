//! Check pipeline: every stage for one address, folded into one verdict.
//!
//! Stages run in order and may short-circuit:
//!
//! ```text
//! syntax -> domain -> disposable -> blacklist -> MX -> SMTP
//! ```
//!
//! Free-provider, government-TLD, role, no-reply and typo checks never
//! short-circuit; they only set flags, lower the score, and role/no-reply cap
//! a deliverable verdict at `risky`.

mod options;
mod score;
mod types;

pub use options::{DisposablePolicy, PipelineOptions};
pub use score::Penalty;
pub use types::{CheckFlags, ResultCode, VerificationRequest, VerificationResult, VerificationState};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use score::ScoreCard;

use crate::mx::{DnsError, MailRoute, MxResolver, RouteKind};
use crate::ratelimit::{RateLimitExceeded, SmtpRateLimiter};
use crate::reference::ReferenceHandle;
use crate::skiplist::{FailureKind, MxSkipList};
use crate::smtp_verify::{MailboxProber, ProbeOutcome, SmtpProbeError, SmtpProbeOptions, SmtpProbeResult};
use crate::storage::BlacklistStore;
use crate::validator::{NormalizedEmail, normalize_email};

/// Shared collaborators of a [`CheckPipeline`].
#[derive(Clone)]
pub struct PipelineComponents {
    pub resolver: Arc<MxResolver>,
    pub skip_list: Arc<MxSkipList>,
    pub limiter: Arc<SmtpRateLimiter>,
    pub prober: Arc<dyn MailboxProber>,
    pub reference: ReferenceHandle,
    pub blacklist: Arc<dyn BlacklistStore>,
}

pub struct CheckPipeline {
    components: PipelineComponents,
    options: PipelineOptions,
    mail_from_domain: String,
    max_mx: usize,
}

impl std::fmt::Debug for CheckPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckPipeline")
            .field("options", &self.options)
            .field("mail_from_domain", &self.mail_from_domain)
            .field("max_mx", &self.max_mx)
            .finish_non_exhaustive()
    }
}

impl CheckPipeline {
    pub fn new(
        components: PipelineComponents,
        options: PipelineOptions,
        smtp: &SmtpProbeOptions,
    ) -> Self {
        Self {
            components,
            options,
            mail_from_domain: smtp.mail_from_domain.clone(),
            max_mx: smtp.max_mx.max(1),
        }
    }

    pub fn components(&self) -> &PipelineComponents {
        &self.components
    }

    pub async fn evaluate(&self, address: &str) -> VerificationResult {
        self.evaluate_request(&VerificationRequest::new(address)).await
    }

    /// Full evaluation; an exhausted rate limit becomes `unknown` /
    /// `rate_limited`.
    pub async fn evaluate_request(&self, request: &VerificationRequest) -> VerificationResult {
        match self.run(request, false).await {
            Ok(result) => result,
            Err(limit) => {
                let mut result = VerificationResult::without_checks(
                    request,
                    VerificationState::Unknown,
                    ResultCode::RateLimited,
                );
                result.smtp_response = Some(limit.to_string());
                result
            }
        }
    }

    /// Like [`evaluate_request`](Self::evaluate_request), but hands a rate
    /// limit back to the caller so the address can be retried later.
    ///
    /// # Errors
    ///
    /// [`RateLimitExceeded`] when the destination domain is out of budget
    /// before an SMTP verdict was reached.
    pub async fn evaluate_deferrable(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, RateLimitExceeded> {
        self.run(request, true).await
    }

    async fn run(
        &self,
        request: &VerificationRequest,
        defer: bool,
    ) -> Result<VerificationResult, RateLimitExceeded> {
        let email = normalize_email(&request.address, self.options.validation_mode);
        let mut draft = Draft::new(request, &email);
        if !email.valid {
            debug!(address = %email.original, reasons = ?email.reasons, "syntax check failed");
            draft.card.add(Penalty::Syntax);
            return Ok(draft.finish(VerificationState::Undeliverable, ResultCode::SyntaxError));
        }
        draft.flags.syntax = true;

        let reference = self.components.reference.snapshot();
        let domain = email.ascii_domain.as_str();
        let local = email.local.as_str();

        draft.flags.is_free = reference.is_free(domain);
        draft.flags.government_tld = reference.is_government(domain);
        if reference.is_disposable(domain) {
            draft.flags.disposable = true;
            draft.card.add(Penalty::Disposable);
        }
        if reference.is_role(local) {
            draft.flags.role = true;
            draft.card.add(Penalty::Role);
        }
        if reference.is_no_reply(local) {
            draft.flags.no_reply = true;
            draft.card.add(Penalty::NoReply);
        }
        if let Some(fix) = reference.suggest_domain(domain) {
            draft.flags.typo_domain = true;
            draft.did_you_mean = Some(format!("{local}@{fix}"));
            draft.card.add(Penalty::Typo);
        }

        let route = match self.components.resolver.resolve(domain).await {
            Ok(route) => route,
            Err(
                err @ (DnsError::NotFound { .. }
                | DnsError::EmptyDomain
                | DnsError::IdnaConversion { .. }),
            ) => {
                debug!(%domain, error = %err, "domain does not receive mail");
                draft.card.add(Penalty::DomainNotFound);
                return Ok(draft.finish(VerificationState::Undeliverable, ResultCode::DomainNotFound));
            }
            Err(err) => {
                warn!(%domain, error = %err, "DNS resolution failed");
                draft.card.add(Penalty::Unverified);
                return Ok(draft.finish(VerificationState::Unknown, ResultCode::DnsError));
            }
        };
        draft.flags.domain_validity = true;
        draft.flags.mx_record = route.has_mx();

        if draft.flags.disposable {
            let state = self.options.disposable_policy.state();
            return Ok(draft.finish(state, ResultCode::Disposable));
        }

        let lookup = email.ascii_address().to_ascii_lowercase();
        match self.components.blacklist.find_blacklisted(&lookup, domain).await {
            Ok(Some(entry)) => {
                debug!(address = %lookup, reason = %entry.reason, "address is blacklisted");
                draft.flags.blacklist = true;
                draft.card.add(Penalty::Blacklisted);
                return Ok(draft.finish(
                    VerificationState::Undeliverable,
                    ResultCode::blacklisted(&entry.reason),
                ));
            }
            Ok(None) => {}
            Err(err) => warn!(address = %lookup, error = %err, "blacklist lookup failed, skipping"),
        }

        match route.kind {
            RouteKind::NullMx => {
                draft.card.add(Penalty::NullMx);
                return Ok(draft.finish(VerificationState::Undeliverable, ResultCode::NoMxRecord));
            }
            RouteKind::Implicit => draft.card.add(Penalty::ImplicitRoute),
            RouteKind::Mx => {}
        }
        draft.flags.isp_esp = route
            .hosts
            .iter()
            .any(|record| reference.is_isp_esp_host(&record.exchange));

        let (state, result) = self.smtp_stage(&email, &route, &mut draft, defer).await?;
        Ok(draft.finish(state, result))
    }

    async fn smtp_stage(
        &self,
        email: &NormalizedEmail,
        route: &MailRoute,
        draft: &mut Draft<'_>,
        defer: bool,
    ) -> Result<(VerificationState, ResultCode), RateLimitExceeded> {
        let mut skipped = 0usize;
        let mut probed = 0usize;
        let mut limited = false;
        let mut mailbox_full = false;

        for host in route.candidates(self.max_mx) {
            if self.host_is_skipped(host).await {
                skipped += 1;
                continue;
            }

            let permit = match self.components.limiter.acquire(&email.ascii_domain) {
                Ok(permit) => permit,
                Err(limit) if defer => return Err(limit),
                Err(limit) => {
                    debug!(domain = %limit.domain, retry_after = limit.retry_after_secs, "no SMTP budget left");
                    draft.smtp_response = Some(limit.to_string());
                    limited = true;
                    break;
                }
            };

            probed += 1;
            draft.mx_host = Some(host.to_string());
            let outcome = self
                .components
                .prober
                .probe(host, &self.mail_from_domain, email)
                .await;
            drop(permit);
            self.note_probe(host, &outcome).await;

            match outcome {
                Ok(probe) => {
                    draft.smtp_response = probe.response_text();
                    if probe.outcome.is_conclusive() {
                        return Ok(conclude(&probe, draft));
                    }
                    if probe.mailbox_full {
                        mailbox_full = true;
                        break;
                    }
                }
                Err(err) => draft.smtp_response = Some(err.to_string()),
            }
        }

        if mailbox_full {
            draft.flags.smtp = true;
            draft.flags.mailbox_full = true;
            draft.card.add(Penalty::MailboxFull);
            return Ok((VerificationState::Risky, ResultCode::MailboxFull));
        }

        draft.card.add(Penalty::Unverified);
        let result = if probed > 0 {
            ResultCode::SmtpUnavailable
        } else if limited {
            ResultCode::RateLimited
        } else if skipped > 0 {
            ResultCode::MxSkipped
        } else {
            ResultCode::SmtpUnavailable
        };
        debug!(domain = %email.ascii_domain, probed, skipped, limited, %result, "no SMTP verdict");
        Ok((VerificationState::Unknown, result))
    }

    /// Skip-list storage problems fail open: the host gets probed.
    async fn host_is_skipped(&self, host: &str) -> bool {
        match self.components.skip_list.is_skipped(host).await {
            Ok(skipped) => {
                if skipped {
                    debug!(%host, "MX host is skip-listed");
                }
                skipped
            }
            Err(err) => {
                warn!(%host, error = %err, "skip-list lookup failed, probing anyway");
                false
            }
        }
    }

    async fn note_probe(&self, host: &str, outcome: &Result<SmtpProbeResult, SmtpProbeError>) {
        let skip_list = &self.components.skip_list;
        let recorded = match outcome {
            Ok(probe) if probe.anti_abuse => {
                let text = probe.response_text();
                skip_list
                    .record_failure(host, FailureKind::AntiAbuse, text.as_deref())
                    .await
                    .map(drop)
            }
            Ok(probe) if probe.outcome.is_conclusive() || probe.mailbox_full => {
                skip_list.record_success(host).await
            }
            Ok(probe) => {
                let kind = match probe.outcome {
                    ProbeOutcome::ConnectionFailed => FailureKind::ConnectionRefused,
                    ProbeOutcome::Timeout => FailureKind::Timeout,
                    _ => FailureKind::Transient,
                };
                let text = probe.response_text();
                skip_list
                    .record_failure(host, kind, text.as_deref())
                    .await
                    .map(drop)
            }
            Err(err) => skip_list
                .record_failure(host, FailureKind::ProtocolError, Some(&err.to_string()))
                .await
                .map(drop),
        };
        if let Err(err) = recorded {
            warn!(%host, error = %err, "failed to update skip list");
        }
    }
}

fn conclude(probe: &SmtpProbeResult, draft: &mut Draft<'_>) -> (VerificationState, ResultCode) {
    let verdict = match probe.outcome {
        ProbeOutcome::Rejected => {
            draft.card.add(Penalty::MailboxRejected);
            return (VerificationState::Undeliverable, ResultCode::MailboxNotFound);
        }
        ProbeOutcome::CatchAllSuspected => {
            draft.card.add(Penalty::CatchAll);
            ResultCode::AcceptedCatchAll
        }
        _ => ResultCode::Accepted,
    };
    draft.flags.smtp = true;

    if draft.flags.no_reply {
        (VerificationState::Risky, ResultCode::NoReply)
    } else if draft.flags.role {
        (VerificationState::Risky, ResultCode::RoleAccount)
    } else {
        (VerificationState::Deliverable, verdict)
    }
}

/// Result under construction.
struct Draft<'a> {
    request: &'a VerificationRequest,
    address: String,
    local_part: String,
    domain: String,
    flags: CheckFlags,
    card: ScoreCard,
    did_you_mean: Option<String>,
    mx_host: Option<String>,
    smtp_response: Option<String>,
}

impl<'a> Draft<'a> {
    fn new(request: &'a VerificationRequest, email: &NormalizedEmail) -> Self {
        Self {
            request,
            address: email.original.trim().to_string(),
            local_part: email.local.clone(),
            domain: email.domain.clone(),
            flags: CheckFlags::default(),
            card: ScoreCard::default(),
            did_you_mean: None,
            mx_host: None,
            smtp_response: None,
        }
    }

    fn finish(self, state: VerificationState, result: ResultCode) -> VerificationResult {
        VerificationResult {
            address: self.address,
            local_part: self.local_part,
            domain: self.domain,
            state,
            result,
            score: self.card.score(),
            flags: self.flags,
            did_you_mean: self.did_you_mean,
            mx_host: self.mx_host,
            smtp_response: self.smtp_response,
            source: self.request.source.clone(),
            job_id: self.request.job_id.clone(),
            verified_at: Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests;
