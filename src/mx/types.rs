use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// How mail for a domain is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Published MX records.
    Mx,
    /// No MX records; the domain's own A/AAAA record is the mail host.
    Implicit,
    /// RFC 7505 null MX: the domain accepts no mail.
    NullMx,
}

/// Resolved mail route for one domain, hosts in ascending preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRoute {
    pub domain: String,
    pub kind: RouteKind,
    pub hosts: Vec<MxRecord>,
}

impl MailRoute {
    pub fn has_mx(&self) -> bool {
        self.kind == RouteKind::Mx
    }

    pub fn accepts_mail(&self) -> bool {
        self.kind != RouteKind::NullMx && !self.hosts.is_empty()
    }

    /// Host names to probe, best preference first, at most `max`.
    pub fn candidates(&self, max: usize) -> Vec<&str> {
        self.hosts
            .iter()
            .take(max.max(1))
            .map(|record| record.exchange.as_str())
            .collect()
    }
}
