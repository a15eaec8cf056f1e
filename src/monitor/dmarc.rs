use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::MonitorPayload;

/// What the `_dmarc` TXT lookup found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DmarcStatus {
    Missing,
    MultipleRecords { records: Vec<String> },
    Invalid { record: String, issue: DmarcIssue },
    /// `p=none`: reports only, nothing is enforced.
    Monitoring { record: String },
    Enforced { record: String, policy: DmarcPolicy },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DmarcIssue {
    InvalidVersion,
    MissingPolicy,
    UnknownPolicy(String),
    /// `pct` below 100 or not a number.
    PartialCoverage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DmarcPolicy {
    Quarantine,
    Reject,
}

impl DmarcStatus {
    /// Alert payload, `None` when the record enforces a policy.
    pub fn payload(&self, domain: &str) -> Option<MonitorPayload> {
        let (issue_type, message) = match self {
            Self::Enforced { .. } => return None,
            Self::Missing => ("missing", format!("no DMARC record published for {domain}")),
            Self::MultipleRecords { records } => (
                "multiple_records",
                format!(
                    "{} DMARC records published for {domain}, receivers ignore all of them",
                    records.len()
                ),
            ),
            Self::Invalid { issue, .. } => match issue {
                DmarcIssue::InvalidVersion => (
                    "invalid_version",
                    format!("DMARC record for {domain} does not start with v=DMARC1"),
                ),
                DmarcIssue::MissingPolicy => (
                    "missing_policy",
                    format!("DMARC record for {domain} has no p= tag"),
                ),
                DmarcIssue::UnknownPolicy(policy) => (
                    "unknown_policy",
                    format!("DMARC record for {domain} has unknown policy p={policy}"),
                ),
                DmarcIssue::PartialCoverage(pct) => (
                    "partial_coverage",
                    format!("DMARC policy for {domain} only applies to pct={pct}"),
                ),
            },
            Self::Monitoring { .. } => (
                "policy_none",
                format!("DMARC policy for {domain} is p=none, spoofed mail is still delivered"),
            ),
        };
        Some(MonitorPayload::Dmarc {
            issue_type: issue_type.to_string(),
            message,
        })
    }
}

pub(crate) fn evaluate(records: &[String]) -> DmarcStatus {
    let mut dmarc_records: Vec<String> = records
        .iter()
        .map(|record| record.trim())
        .filter(|trimmed| starts_with_ignore_ascii_case(trimmed, "v=dmarc1"))
        .map(str::to_string)
        .collect();

    match dmarc_records.len() {
        0 => return DmarcStatus::Missing,
        1 => {}
        _ => {
            dmarc_records.sort();
            dmarc_records.dedup();
            if dmarc_records.len() > 1 {
                return DmarcStatus::MultipleRecords {
                    records: dmarc_records,
                };
            }
        }
    }

    let record = dmarc_records.remove(0);
    let tags = parse_tags(&record);

    let version_ok = tags
        .get("v")
        .is_some_and(|version| version.eq_ignore_ascii_case("dmarc1"));
    if !version_ok {
        return invalid(record, DmarcIssue::InvalidVersion);
    }

    let Some(policy) = tags.get("p") else {
        return invalid(record, DmarcIssue::MissingPolicy);
    };
    let policy = match policy.to_ascii_lowercase().as_str() {
        "none" => return DmarcStatus::Monitoring { record },
        "quarantine" => DmarcPolicy::Quarantine,
        "reject" => DmarcPolicy::Reject,
        other => return invalid(record, DmarcIssue::UnknownPolicy(other.to_string())),
    };

    if let Some(pct) = tags.get("pct") {
        if pct.parse::<u8>().map_or(true, |pct| pct < 100) {
            let pct = pct.clone();
            return invalid(record, DmarcIssue::PartialCoverage(pct));
        }
    }

    DmarcStatus::Enforced { record, policy }
}

fn invalid(record: String, issue: DmarcIssue) -> DmarcStatus {
    DmarcStatus::Invalid { record, issue }
}

fn starts_with_ignore_ascii_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn parse_tags(record: &str) -> HashMap<String, String> {
    record
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (key.trim().to_ascii_lowercase(), value.trim().to_string())
        })
        .collect()
}
