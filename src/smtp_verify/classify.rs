use std::sync::LazyLock;

use regex::Regex;

use super::session::SmtpReply;

/// Reputation and policy rejections aimed at the prober rather than the
/// mailbox.
static ANTI_ABUSE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(black ?list|spam|abusix|access denied|banned|blocked|connection rejected|reverse hostname|cannot find your hostname|host rejected|relay not permitted|not yet authorized|poor reputation|listed (at|on|in)|\b(rbl|dnsbl)\b|too many (connections|recipients|messages)|rate limit)",
    )
    .ok()
});

static MAILBOX_FULL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(mailbox (is )?full|over ?quota|quota exceeded|insufficient (system )?storage|mailbox size limit)").ok()
});

static ENHANCED_CODE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([245])\.(\d{1,3})\.(\d{1,3})\b").ok());

/// RFC 3463 enhanced status code at the start of the first line, if any.
pub(crate) fn enhanced_code(reply: &SmtpReply) -> Option<(u8, u16, u16)> {
    let first = reply.lines.first()?;
    let re = ENHANCED_CODE.as_ref()?;
    let caps = re.captures(first.trim_start())?;
    Some((
        caps.get(1)?.as_str().parse().ok()?,
        caps.get(2)?.as_str().parse().ok()?,
        caps.get(3)?.as_str().parse().ok()?,
    ))
}

pub(crate) fn is_anti_abuse(reply: &SmtpReply) -> bool {
    if let Some((_, 7, _)) = enhanced_code(reply) {
        // x.7.x is the security/policy class
        return true;
    }
    ANTI_ABUSE
        .as_ref()
        .is_some_and(|re| reply.lines.iter().any(|line| re.is_match(line)))
}

pub(crate) fn is_mailbox_full(reply: &SmtpReply) -> bool {
    if matches!(reply.code, 452 | 552) {
        return true;
    }
    if let Some((_, 2, 2)) = enhanced_code(reply) {
        return true;
    }
    MAILBOX_FULL
        .as_ref()
        .is_some_and(|re| reply.lines.iter().any(|line| re.is_match(line)))
}

/// Definitive "no such mailbox" answer.
pub(crate) fn is_permanent_no_mailbox(reply: &SmtpReply) -> bool {
    if !reply.is_permanent_failure() {
        return false;
    }
    match enhanced_code(reply) {
        Some((5, 1, _)) => true,
        Some(_) => false,
        None => matches!(reply.code, 550 | 551 | 553),
    }
}
