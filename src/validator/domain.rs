const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Lowercase Unicode form and IDNA ASCII form of `domain`, without the
/// root dot. The ASCII form is empty when conversion fails.
pub(crate) fn normalize_domain(domain: &str) -> (String, String) {
    let trimmed = domain.trim().trim_end_matches('.');
    let ascii = idna::domain_to_ascii(trimmed).unwrap_or_default();
    (trimmed.to_lowercase(), ascii)
}

/// Every rule `domain` breaks, as human-readable reasons.
pub(crate) fn domain_issues(domain: &str) -> Vec<String> {
    if domain.starts_with('[') && domain.ends_with(']') {
        return vec!["address literals are not supported".to_string()];
    }

    let (_, ascii) = normalize_domain(domain);
    if ascii.is_empty() {
        return vec![if domain.trim().is_empty() {
            "domain is empty".to_string()
        } else {
            "domain punycode conversion failed".to_string()
        }];
    }

    let mut issues = Vec::new();
    if ascii.len() > MAX_DOMAIN_LEN {
        issues.push(format!("domain length {} > {MAX_DOMAIN_LEN}", ascii.len()));
    }

    let labels: Vec<&str> = ascii.split('.').collect();
    if labels.len() < 2 {
        issues.push("domain must contain at least one dot".to_string());
    }
    for label in &labels {
        if let Some(issue) = label_issue(label) {
            issues.push(issue);
        }
    }
    if labels.len() >= 2 {
        let tld = labels[labels.len() - 1];
        if !tld.is_empty() && tld.bytes().all(|b| b.is_ascii_digit()) {
            issues.push(format!("top-level label '{tld}' is numeric"));
        }
    }
    issues
}

fn label_issue(label: &str) -> Option<String> {
    if label.is_empty() {
        return Some("empty domain label".to_string());
    }
    if label.len() > MAX_LABEL_LEN {
        return Some(format!("domain label '{label}' length {} > {MAX_LABEL_LEN}", label.len()));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Some(format!("domain label '{label}' cannot start/end with '-'"));
    }
    if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Some(format!("domain label '{label}' has invalid chars"));
    }
    None
}
