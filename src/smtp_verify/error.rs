use thiserror::Error;

/// Failures of the SMTP conversation itself. Mailbox rejections are not
/// errors; they are reported as [`ProbeOutcome`](super::ProbeOutcome)s.
#[derive(Debug, Error)]
pub enum SmtpProbeError {
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{host} timed out during {stage}")]
    Timeout { host: String, stage: String },
    #[error("protocol error from {host}: {message}")]
    Protocol { host: String, message: String },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
}

impl SmtpProbeError {
    pub(crate) fn connect(host: &str, source: std::io::Error) -> Self {
        Self::Connect {
            host: host.to_string(),
            source,
        }
    }

    pub(crate) fn timeout(host: &str, stage: &str) -> Self {
        Self::Timeout {
            host: host.to_string(),
            stage: stage.to_string(),
        }
    }

    pub(crate) fn protocol(host: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            host: host.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}
