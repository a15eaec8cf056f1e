use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BackoffPolicy;

/// Why a host ended up on the skip list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConnectionRefused,
    Timeout,
    ProtocolError,
    AntiAbuse,
    Transient,
    Manual,
}

impl FailureKind {
    /// Hard failures skip-list a host on first occurrence; soft ones only
    /// after repeated strikes.
    pub const fn is_hard(self) -> bool {
        matches!(
            self,
            Self::ConnectionRefused | Self::ProtocolError | Self::AntiAbuse | Self::Manual
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRefused => "connection_refused",
            Self::Timeout => "timeout",
            Self::ProtocolError => "protocol_error",
            Self::AntiAbuse => "anti_abuse",
            Self::Transient => "transient",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted skip-list row, keyed by host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxSkipEntry {
    pub host: String,
    pub reason: FailureKind,
    pub last_response: Option<String>,
    pub failure_count: u32,
    pub last_failed_at: DateTime<Utc>,
    /// `None` means permanent (manual entries).
    pub expires_at: Option<DateTime<Utc>>,
    pub is_manual: bool,
}

impl MxSkipEntry {
    pub fn manual(host: &str, note: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            host: host.to_ascii_lowercase(),
            reason: FailureKind::Manual,
            last_response: note,
            failure_count: 0,
            last_failed_at: at,
            expires_at: None,
            is_manual: true,
        }
    }

    /// Whether the entry still blocks probing at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_manual || self.expires_at.is_none_or(|expires_at| expires_at > now)
    }

    /// Whether the sweep may delete this row.
    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        !self.is_manual && self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Fold a failure into an existing row (or start a new one).
    ///
    /// Stores call this inside their atomic upsert so the increment and the
    /// new expiry land together.
    pub fn apply_failure(
        existing: Option<Self>,
        failure: &SkipFailure,
        policy: &BackoffPolicy,
    ) -> Self {
        match existing {
            Some(mut entry) => {
                entry.failure_count = entry.failure_count.saturating_add(1);
                entry.last_failed_at = failure.at;
                if failure.response.is_some() {
                    entry.last_response = failure.response.clone();
                }
                if !entry.is_manual {
                    entry.reason = failure.kind;
                    entry.expires_at = Some(policy.expiry(entry.failure_count, failure.at));
                }
                entry
            }
            None => Self {
                host: failure.host.clone(),
                reason: failure.kind,
                last_response: failure.response.clone(),
                failure_count: 1,
                last_failed_at: failure.at,
                expires_at: Some(policy.expiry(1, failure.at)),
                is_manual: false,
            },
        }
    }
}

/// A failure observed against a host, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipFailure {
    pub host: String,
    pub kind: FailureKind,
    pub response: Option<String>,
    pub at: DateTime<Utc>,
}
