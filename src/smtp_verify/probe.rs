use async_trait::async_trait;
use tracing::{debug, warn};

use super::classify::{is_anti_abuse, is_mailbox_full, is_permanent_no_mailbox};
use super::error::SmtpProbeError;
use super::options::SmtpProbeOptions;
use super::session::{SmtpReply, SmtpSession};
use super::types::{ProbeOutcome, SmtpProbeResult};
use super::util::random_local_part;
use crate::validator::NormalizedEmail;

/// Asks one mail host whether it would accept mail for a candidate address.
#[async_trait]
pub trait MailboxProber: Send + Sync {
    /// Connection failures and timeouts come back as outcomes; only protocol
    /// violations (garbage replies, dropped sessions) are errors.
    async fn probe(
        &self,
        mx_host: &str,
        mail_from_domain: &str,
        candidate: &NormalizedEmail,
    ) -> Result<SmtpProbeResult, SmtpProbeError>;
}

/// [`MailboxProber`] speaking SMTP over TCP. Never sends `DATA`.
#[derive(Debug, Clone, Default)]
pub struct SmtpProber {
    options: SmtpProbeOptions,
}

impl SmtpProber {
    pub fn new(options: SmtpProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SmtpProbeOptions {
        &self.options
    }

    async fn run_session(
        &self,
        mx_host: &str,
        mail_from_domain: &str,
        candidate: &NormalizedEmail,
    ) -> Result<SmtpProbeResult, SmtpProbeError> {
        let mut session = SmtpSession::connect(
            mx_host,
            self.options.port,
            self.options.connect_timeout(),
            self.options.command_timeout(),
        )
        .await?;

        let mut result = self
            .converse(&mut session, mx_host, mail_from_domain, candidate)
            .await?;
        session.quit().await;
        result.transcript = std::mem::take(&mut session.transcript);
        Ok(result)
    }

    async fn converse(
        &self,
        session: &mut SmtpSession,
        mx_host: &str,
        mail_from_domain: &str,
        candidate: &NormalizedEmail,
    ) -> Result<SmtpProbeResult, SmtpProbeError> {
        let greeting = session.read_greeting().await?;
        if !greeting.is_positive_completion() {
            return Ok(refusal(mx_host, &greeting, "greeting"));
        }

        let helo = self.options.helo_name(mail_from_domain);
        let ehlo = session.send_command(&format!("EHLO {helo}")).await?;
        if !ehlo.is_positive_completion() {
            let fallback = session.send_command(&format!("HELO {helo}")).await?;
            if !fallback.is_positive_completion() {
                return Ok(refusal(mx_host, &fallback, "HELO"));
            }
        }

        let sender = self.options.envelope_sender(mail_from_domain);
        let mail = session.send_command(&format!("MAIL FROM:<{sender}>")).await?;
        if !mail.is_positive_completion() {
            return Ok(refusal(mx_host, &mail, "MAIL FROM"));
        }

        let target = session
            .send_command(&format!("RCPT TO:<{}>", candidate.ascii_address()))
            .await?;
        if !target.is_positive_completion() {
            return Ok(classify_rcpt(mx_host, &target));
        }

        let mut result = SmtpProbeResult::new(mx_host, ProbeOutcome::Accepted).with_reply(&target);
        for _ in 0..self.options.catchall_probes.min(5) {
            let alias = random_local_part(candidate.local.len().max(12));
            if alias.eq_ignore_ascii_case(&candidate.local) {
                continue;
            }
            let cmd = format!("RCPT TO:<{alias}@{}>", candidate.ascii_domain);
            match session.send_command(&cmd).await {
                Ok(reply) if reply.is_positive_completion() => {
                    debug!(host = %mx_host, %alias, "random alias accepted, catch-all suspected");
                    result.outcome = ProbeOutcome::CatchAllSuspected;
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    // The target was already accepted; a broken alias probe
                    // does not change that.
                    debug!(host = %mx_host, error = %err, "catch-all probe aborted");
                    return Ok(result.with_detail("catch-all probe aborted"));
                }
            }
        }

        let _ = session.send_command("RSET").await;
        Ok(result)
    }
}

#[async_trait]
impl MailboxProber for SmtpProber {
    async fn probe(
        &self,
        mx_host: &str,
        mail_from_domain: &str,
        candidate: &NormalizedEmail,
    ) -> Result<SmtpProbeResult, SmtpProbeError> {
        let session = self.run_session(mx_host, mail_from_domain, candidate);
        let outcome = match tokio::time::timeout(self.options.probe_timeout(), session).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(host = %mx_host, "probe exceeded wall-clock limit");
                return Ok(SmtpProbeResult::new(mx_host, ProbeOutcome::Timeout)
                    .with_detail("probe timed out"));
            }
        };

        match outcome {
            Ok(result) => {
                debug!(
                    host = %mx_host,
                    outcome = %result.outcome,
                    anti_abuse = result.anti_abuse,
                    "SMTP probe finished"
                );
                Ok(result)
            }
            Err(SmtpProbeError::Connect { host, source }) => {
                debug!(%host, error = %source, "SMTP connection failed");
                Ok(SmtpProbeResult::new(mx_host, ProbeOutcome::ConnectionFailed)
                    .with_detail(source.to_string()))
            }
            Err(SmtpProbeError::Timeout { host, stage }) => {
                debug!(%host, %stage, "SMTP command timed out");
                Ok(SmtpProbeResult::new(mx_host, ProbeOutcome::Timeout)
                    .with_detail(format!("timed out during {stage}")))
            }
            Err(err) => {
                warn!(host = %mx_host, error = %err, "SMTP protocol failure");
                Err(err)
            }
        }
    }
}

/// Non-2xx answer before RCPT: the host refuses us, not the mailbox.
fn refusal(host: &str, reply: &SmtpReply, stage: &str) -> SmtpProbeResult {
    let mut result = SmtpProbeResult::new(host, ProbeOutcome::Transient)
        .with_reply(reply)
        .with_detail(format!("{stage} refused"));
    result.anti_abuse = reply.is_permanent_failure() || is_anti_abuse(reply);
    result
}

fn classify_rcpt(host: &str, reply: &SmtpReply) -> SmtpProbeResult {
    if is_anti_abuse(reply) {
        let mut result = SmtpProbeResult::new(host, ProbeOutcome::Transient).with_reply(reply);
        result.anti_abuse = true;
        return result;
    }
    if is_mailbox_full(reply) {
        let mut result = SmtpProbeResult::new(host, ProbeOutcome::Transient).with_reply(reply);
        result.mailbox_full = true;
        return result;
    }
    if is_permanent_no_mailbox(reply) {
        return SmtpProbeResult::new(host, ProbeOutcome::Rejected).with_reply(reply);
    }
    if reply.code == 521 {
        return SmtpProbeResult::new(host, ProbeOutcome::Transient)
            .with_reply(reply)
            .with_detail("host does not accept mail");
    }
    if reply.is_permanent_failure() {
        return SmtpProbeResult::new(host, ProbeOutcome::Rejected).with_reply(reply);
    }
    SmtpProbeResult::new(host, ProbeOutcome::Transient).with_reply(reply)
}
