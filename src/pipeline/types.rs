use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bulk::JobId;

/// Coarse verdict bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Deliverable,
    Undeliverable,
    Risky,
    Unknown,
    Error,
}

impl VerificationState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deliverable => "deliverable",
            Self::Undeliverable => "undeliverable",
            Self::Risky => "risky",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained, machine-readable reason behind a verdict.
///
/// Serialized as a plain string. A blacklist hit carries the reason stored
/// with the entry (`spamtrap`, `complainer`...), so unknown strings read back
/// as [`ResultCode::Blacklisted`]. Build those with
/// [`ResultCode::blacklisted`] so they never read back as a built-in code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResultCode {
    Accepted,
    AcceptedCatchAll,
    MailboxNotFound,
    MailboxFull,
    SyntaxError,
    DomainNotFound,
    NoMxRecord,
    Disposable,
    RoleAccount,
    NoReply,
    Blacklisted(String),
    RateLimited,
    MxSkipped,
    SmtpUnavailable,
    DnsError,
    UnreadableEntry,
    StorageError,
    Cancelled,
    InternalError,
}

impl ResultCode {
    const FIXED: [(Self, &'static str); 18] = [
        (Self::Accepted, "accepted"),
        (Self::AcceptedCatchAll, "accepted_catch_all"),
        (Self::MailboxNotFound, "mailbox_not_found"),
        (Self::MailboxFull, "mailbox_full"),
        (Self::SyntaxError, "syntax_error"),
        (Self::DomainNotFound, "domain_not_found"),
        (Self::NoMxRecord, "no_mx_record"),
        (Self::Disposable, "disposable"),
        (Self::RoleAccount, "role_account"),
        (Self::NoReply, "no_reply"),
        (Self::RateLimited, "rate_limited"),
        (Self::MxSkipped, "mx_skipped"),
        (Self::SmtpUnavailable, "smtp_unavailable"),
        (Self::DnsError, "dns_error"),
        (Self::UnreadableEntry, "unreadable_entry"),
        (Self::StorageError, "storage_error"),
        (Self::Cancelled, "cancelled"),
        (Self::InternalError, "internal_error"),
    ];

    /// Result code for a blacklist hit. An empty reason, or one spelled like
    /// a built-in code, gets a `blacklisted:` prefix.
    pub fn blacklisted(reason: &str) -> Self {
        let reason = reason.trim();
        if reason.is_empty() {
            Self::Blacklisted("blacklisted".to_string())
        } else if Self::FIXED.iter().any(|(_, name)| *name == reason) {
            Self::Blacklisted(format!("blacklisted:{reason}"))
        } else {
            Self::Blacklisted(reason.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        if let Self::Blacklisted(reason) = self {
            return reason;
        }
        Self::FIXED
            .iter()
            .find(|(code, _)| code == self)
            .map_or("", |(_, name)| *name)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ResultCode> for String {
    fn from(code: ResultCode) -> Self {
        code.as_str().to_string()
    }
}

impl From<String> for ResultCode {
    fn from(value: String) -> Self {
        Self::FIXED
            .iter()
            .find(|(_, name)| *name == value)
            .map_or(Self::Blacklisted(value), |(code, _)| code.clone())
    }
}

/// One boolean per sub-check, always populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFlags {
    pub syntax: bool,
    pub mx_record: bool,
    pub smtp: bool,
    pub disposable: bool,
    pub role: bool,
    pub no_reply: bool,
    pub typo_domain: bool,
    pub mailbox_full: bool,
    pub is_free: bool,
    pub blacklist: bool,
    pub domain_validity: bool,
    pub isp_esp: bool,
    pub government_tld: bool,
    /// No model-based analysis runs in this engine; always false.
    pub ai_analysis: bool,
}

impl CheckFlags {
    /// Column names, in [`values`](Self::values) order.
    pub const NAMES: [&'static str; 14] = [
        "syntax",
        "mx_record",
        "smtp",
        "disposable",
        "role",
        "no_reply",
        "typo_domain",
        "mailbox_full",
        "is_free",
        "blacklist",
        "domain_validity",
        "isp_esp",
        "government_tld",
        "ai_analysis",
    ];

    pub fn values(&self) -> [bool; 14] {
        [
            self.syntax,
            self.mx_record,
            self.smtp,
            self.disposable,
            self.role,
            self.no_reply,
            self.typo_domain,
            self.mailbox_full,
            self.is_free,
            self.blacklist,
            self.domain_validity,
            self.isp_esp,
            self.government_tld,
            self.ai_analysis,
        ]
    }
}

/// Input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub address: String,
    pub source: Option<String>,
    pub job_id: Option<JobId>,
}

impl VerificationRequest {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            source: None,
            job_id: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn for_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub address: String,
    pub local_part: String,
    pub domain: String,
    pub state: VerificationState,
    pub result: ResultCode,
    pub score: u8,
    #[serde(flatten)]
    pub flags: CheckFlags,
    pub did_you_mean: Option<String>,
    pub mx_host: Option<String>,
    pub smtp_response: Option<String>,
    pub source: Option<String>,
    pub job_id: Option<JobId>,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Result for an address the pipeline never evaluated (unreadable entry,
    /// storage failure, cancellation...).
    pub fn without_checks(
        request: &VerificationRequest,
        state: VerificationState,
        result: ResultCode,
    ) -> Self {
        let address = request.address.trim().to_string();
        let (local_part, domain) = address
            .rsplit_once('@')
            .map(|(local, domain)| (local.to_string(), domain.to_ascii_lowercase()))
            .unwrap_or_default();
        Self {
            address,
            local_part,
            domain,
            state,
            result,
            score: 0,
            flags: CheckFlags::default(),
            did_you_mean: None,
            mx_host: None,
            smtp_response: None,
            source: request.source.clone(),
            job_id: request.job_id.clone(),
            verified_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_round_trip_through_strings() {
        for (code, name) in ResultCode::FIXED {
            assert_eq!(code.as_str(), name);
            assert_eq!(ResultCode::from(name.to_string()), code);
        }
        let custom = ResultCode::from("spamtrap".to_string());
        assert_eq!(custom, ResultCode::Blacklisted("spamtrap".into()));
        assert_eq!(custom.as_str(), "spamtrap");
    }

    #[test]
    fn blacklist_reasons_never_shadow_fixed_codes() {
        let code = ResultCode::blacklisted("disposable");
        assert_eq!(code.as_str(), "blacklisted:disposable");
        assert_eq!(ResultCode::from(String::from(code.clone())), code);

        assert_eq!(ResultCode::blacklisted(" spamtrap "), ResultCode::Blacklisted("spamtrap".into()));
        assert_eq!(ResultCode::blacklisted("").as_str(), "blacklisted");

        let json = serde_json::to_string(&ResultCode::blacklisted("accepted")).unwrap();
        let back: ResultCode = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ResultCode::Blacklisted(_)));
    }

    #[test]
    fn flags_serialize_flat_and_complete() {
        let request = VerificationRequest::new("a@example.com");
        let result = VerificationResult::without_checks(
            &request,
            VerificationState::Error,
            ResultCode::StorageError,
        );
        let json = serde_json::to_value(&result).unwrap();
        for name in CheckFlags::NAMES {
            assert_eq!(json[name], serde_json::Value::Bool(false), "{name}");
        }
        assert_eq!(json["result"], "storage_error");
        assert_eq!(json["state"], "error");
    }
}
