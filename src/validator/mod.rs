//! Syntax stage: RFC 5322 subset for the local part, IDNA + label rules for
//! the domain. Never touches the network.

mod domain;
mod local;
mod types;

pub use types::{NormalizedEmail, ValidationMode, ValidationReport};

use domain::{domain_issues, normalize_domain};
use local::local_part_issue;

const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

/// Split `input` on its single `@`, or `None` when there are zero or several.
fn split_address(input: &str) -> Option<(&str, &str)> {
    let (local, domain) = input.split_once('@')?;
    (!domain.contains('@')).then_some((local, domain))
}

fn syntax_reasons(input: &str, mode: ValidationMode) -> Vec<String> {
    let mut reasons = Vec::new();
    if input.len() > MAX_ADDRESS_LEN {
        reasons.push(format!("total length {} > {MAX_ADDRESS_LEN}", input.len()));
    }

    let Some((local, domain)) = split_address(input) else {
        reasons.push("must contain exactly one '@'".to_string());
        return reasons;
    };

    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        reasons.push(format!(
            "local part length {} invalid (1..={MAX_LOCAL_LEN})",
            local.len()
        ));
    } else if let Some(issue) = local_part_issue(local, mode) {
        reasons.push(issue);
    }

    reasons.extend(domain_issues(domain));
    reasons
}

pub fn validate_email(email: &str, mode: ValidationMode) -> ValidationReport {
    let reasons = syntax_reasons(email.trim(), mode);
    ValidationReport {
        ok: reasons.is_empty(),
        reasons,
    }
}

/// Valide et renvoie une sortie normalisée (local, domaine en minuscules,
/// domaine ASCII). Une adresse invalide est découpée au mieux.
pub fn normalize_email(email: &str, mode: ValidationMode) -> NormalizedEmail {
    let input = email.trim();
    let reasons = syntax_reasons(input, mode);
    let (local, domain) = split_address(input)
        .or_else(|| input.rsplit_once('@'))
        .unwrap_or(("", ""));
    let (domain_lower, ascii_domain) = normalize_domain(domain);

    NormalizedEmail {
        original: email.to_string(),
        local: local.to_string(),
        domain: domain_lower,
        ascii_domain,
        mode,
        valid: reasons.is_empty(),
        reasons,
    }
}
