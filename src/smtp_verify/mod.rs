//! SMTP mailbox probing.
//!
//! [`SmtpProber`] opens a short session against one MX host: greeting, EHLO
//! (HELO fallback), MAIL FROM, RCPT TO for the candidate, then RCPT TO for
//! random aliases to detect catch-all hosts, then RSET and QUIT. The reply
//! that decided the verdict is classified into a [`ProbeOutcome`], with
//! reputation blocks and full mailboxes flagged separately.

mod classify;
mod error;
mod options;
mod probe;
mod session;
mod types;
mod util;

pub use error::SmtpProbeError;
pub use options::SmtpProbeOptions;
pub use probe::{MailboxProber, SmtpProber};
pub use session::SmtpReply;
pub use types::{ProbeOutcome, SmtpProbeResult};
