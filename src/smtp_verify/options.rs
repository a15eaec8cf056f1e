use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[smtp]` settings for [`SmtpProber`](super::SmtpProber).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpProbeOptions {
    #[serde(default = "default_port")]
    pub port: u16,
    /// EHLO name; empty means the MAIL FROM domain.
    #[serde(default)]
    pub helo_domain: String,
    /// Local part of the envelope sender.
    #[serde(default = "default_mail_from_local")]
    pub mail_from_local: String,
    /// Send `MAIL FROM:<>` instead of a real sender.
    #[serde(default)]
    pub null_sender: bool,
    /// Domain used for the envelope sender and EHLO.
    #[serde(default = "default_mail_from_domain")]
    pub mail_from_domain: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Wall-clock bound for a whole session, teardown included.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// MX hosts tried per address.
    #[serde(default = "default_max_mx")]
    pub max_mx: usize,
    /// Random aliases sent after an accepted RCPT.
    #[serde(default = "default_catchall_probes")]
    pub catchall_probes: u8,
}

const fn default_port() -> u16 {
    25
}

fn default_mail_from_local() -> String {
    "verify".to_string()
}

fn default_mail_from_domain() -> String {
    "localhost".to_string()
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

const fn default_command_timeout_ms() -> u64 {
    10_000
}

const fn default_probe_timeout_ms() -> u64 {
    30_000
}

const fn default_max_mx() -> usize {
    3
}

const fn default_catchall_probes() -> u8 {
    1
}

impl Default for SmtpProbeOptions {
    fn default() -> Self {
        Self {
            port: default_port(),
            helo_domain: String::new(),
            mail_from_local: default_mail_from_local(),
            null_sender: false,
            mail_from_domain: default_mail_from_domain(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            max_mx: default_max_mx(),
            catchall_probes: default_catchall_probes(),
        }
    }
}

impl SmtpProbeOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.max(1))
    }

    pub fn helo_name<'a>(&'a self, fallback: &'a str) -> Cow<'a, str> {
        if self.helo_domain.trim().is_empty() {
            Cow::Borrowed(fallback)
        } else {
            Cow::Borrowed(self.helo_domain.as_str())
        }
    }

    /// Envelope sender for `mail_from_domain`; empty for the null sender.
    pub fn envelope_sender(&self, mail_from_domain: &str) -> String {
        if self.null_sender {
            String::new()
        } else {
            format!("{}@{mail_from_domain}", self.mail_from_local)
        }
    }
}
