use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistKind {
    Email,
    Domain,
}

/// Locally blacklisted address or domain. `reason` becomes the result code
/// of any matching verification (`spamtrap`, `complainer`...), prefixed with
/// `blacklisted:` when it collides with a built-in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub value: String,
    pub kind: BlacklistKind,
    pub reason: String,
}

impl BlacklistEntry {
    pub fn email(value: &str, reason: &str) -> Self {
        Self {
            value: value.trim().to_ascii_lowercase(),
            kind: BlacklistKind::Email,
            reason: reason.to_string(),
        }
    }

    pub fn domain(value: &str, reason: &str) -> Self {
        Self {
            value: value.trim().trim_end_matches('.').to_ascii_lowercase(),
            kind: BlacklistKind::Domain,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn key(&self) -> (BlacklistKind, String) {
        (self.kind, self.value.clone())
    }
}
