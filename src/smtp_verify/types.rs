use std::fmt;

use serde::{Deserialize, Serialize};

use super::session::SmtpReply;

/// What a single SMTP session concluded about the candidate mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// RCPT accepted and random aliases rejected.
    Accepted,
    /// RCPT rejected with a permanent "no such mailbox" answer.
    Rejected,
    /// 4xx, mailbox full or policy answer: nothing learned about the mailbox.
    Transient,
    /// Random aliases were accepted too.
    CatchAllSuspected,
    ConnectionFailed,
    Timeout,
}

impl ProbeOutcome {
    /// Accepted, rejected or catch-all: no other host needs to be asked.
    pub fn is_conclusive(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::CatchAllSuspected)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Transient => "transient",
            Self::CatchAllSuspected => "catch_all_suspected",
            Self::ConnectionFailed => "connection_failed",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report of one probe against one MX host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpProbeResult {
    pub host: String,
    pub outcome: ProbeOutcome,
    /// Reply that decided the outcome, when there was one.
    pub reply: Option<SmtpReply>,
    /// The reply looked like a reputation/policy block against the prober.
    pub anti_abuse: bool,
    pub mailbox_full: bool,
    pub detail: Option<String>,
    pub transcript: Vec<String>,
}

impl SmtpProbeResult {
    pub fn new(host: &str, outcome: ProbeOutcome) -> Self {
        Self {
            host: host.to_string(),
            outcome,
            reply: None,
            anti_abuse: false,
            mailbox_full: false,
            detail: None,
            transcript: Vec::new(),
        }
    }

    pub(crate) fn with_reply(mut self, reply: &SmtpReply) -> Self {
        self.reply = Some(reply.clone());
        self
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Reply summary or detail text, whichever explains the outcome.
    pub fn response_text(&self) -> Option<String> {
        self.reply
            .as_ref()
            .map(SmtpReply::summary)
            .or_else(|| self.detail.clone())
    }
}
