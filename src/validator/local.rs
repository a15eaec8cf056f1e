use super::ValidationMode;

/// `atext` specials allowed unquoted (RFC 5322 §3.2.3).
const ATEXT_SPECIALS: &str = "!#$%&'*+-/=?^_`{|}~";

fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || ATEXT_SPECIALS.contains(c)
}

/// First problem with `local`, `None` if it is acceptable in `mode`.
///
/// Relaxed mode additionally accepts a quoted string (`"john doe"`), with
/// `\` escaping a quote or a backslash.
pub(crate) fn local_part_issue(local: &str, mode: ValidationMode) -> Option<String> {
    if mode == ValidationMode::Relaxed && local.len() >= 2 && local.starts_with('"') && local.ends_with('"') {
        return quoted_issue(&local[1..local.len() - 1]);
    }
    dot_atom_issue(local).map(|issue| match mode {
        ValidationMode::Strict => format!("invalid local part (strict rules): {issue}"),
        ValidationMode::Relaxed => format!("invalid local part (relaxed rules): {issue}"),
    })
}

fn dot_atom_issue(local: &str) -> Option<String> {
    if local.starts_with('.') {
        return Some("leading dot".into());
    }
    if local.ends_with('.') {
        return Some("trailing dot".into());
    }
    if local.contains("..") {
        return Some("consecutive dots".into());
    }
    local
        .chars()
        .find(|c| *c != '.' && !is_atext(*c))
        .map(|c| format!("character {c:?} not allowed"))
}

fn quoted_issue(inner: &str) -> Option<String> {
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(' '..='~') => {}
                _ => return Some("invalid local part: dangling escape in quoted string".into()),
            },
            '"' => return Some("invalid local part: unescaped quote in quoted string".into()),
            ' '..='~' => {}
            other => {
                return Some(format!(
                    "invalid local part: character {other:?} not allowed in quoted string"
                ));
            }
        }
    }
    None
}
