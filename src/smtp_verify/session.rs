use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::error::SmtpProbeError;

const MAX_LINE_LEN: u64 = 4_096;
const MAX_REPLY_LINES: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|token| token.eq_ignore_ascii_case(cap))
        })
    }

    /// `"<code> <first line>"`, used for logs and persisted diagnostics.
    pub fn summary(&self) -> String {
        match self.lines.first() {
            Some(line) if !line.is_empty() => format!("{} {line}", self.code),
            _ => self.code.to_string(),
        }
    }
}

/// One SMTP connection. Every read and write is bounded by
/// `command_timeout`; the caller bounds the session as a whole.
pub(crate) struct SmtpSession {
    host: String,
    stream: BufReader<TcpStream>,
    command_timeout: Duration,
    pub transcript: Vec<String>,
}

impl SmtpSession {
    pub async fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, SmtpProbeError> {
        let addrs = timeout(connect_timeout, tokio::net::lookup_host((host, port)))
            .await
            .map_err(|_| SmtpProbeError::timeout(host, "resolve"))?
            .map_err(|err| SmtpProbeError::connect(host, err))?;

        let mut last_err = None;
        for addr in addrs {
            match timeout(connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    return Ok(Self {
                        host: host.to_string(),
                        stream: BufReader::new(stream),
                        command_timeout,
                        transcript: Vec::new(),
                    });
                }
                Ok(Err(err)) => last_err = Some(SmtpProbeError::connect(host, err)),
                Err(_) => last_err = Some(SmtpProbeError::timeout(host, "connect")),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            SmtpProbeError::connect(
                host,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no address for host"),
            )
        }))
    }

    pub async fn read_greeting(&mut self) -> Result<SmtpReply, SmtpProbeError> {
        let host = self.host.clone();
        let reply = timeout(self.command_timeout, self.read_reply())
            .await
            .map_err(|_| SmtpProbeError::timeout(&host, "greeting"))??;
        self.record_reply(&reply);
        Ok(reply)
    }

    pub async fn send_command(&mut self, command: &str) -> Result<SmtpReply, SmtpProbeError> {
        self.record("C", command);
        let host = self.host.clone();
        let stage = command
            .split([' ', ':'])
            .next()
            .unwrap_or(command)
            .to_ascii_uppercase();
        let command_timeout = self.command_timeout;

        let exchange = async {
            let stream = self.stream.get_mut();
            stream
                .write_all(format!("{command}\r\n").as_bytes())
                .await
                .map_err(SmtpProbeError::io)?;
            stream.flush().await.map_err(SmtpProbeError::io)?;
            self.read_reply().await
        };
        let reply = timeout(command_timeout, exchange)
            .await
            .map_err(|_| SmtpProbeError::timeout(&host, &stage))??;
        self.record_reply(&reply);
        Ok(reply)
    }

    /// Polite teardown; errors are irrelevant once the verdict is known.
    pub async fn quit(&mut self) {
        let _ = self.send_command("QUIT").await;
        let _ = self.stream.get_mut().shutdown().await;
    }

    async fn read_reply(&mut self) -> Result<SmtpReply, SmtpProbeError> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;

        loop {
            if lines.len() >= MAX_REPLY_LINES {
                return Err(SmtpProbeError::protocol(&self.host, "reply has too many lines"));
            }
            let line = self.read_line().await?;
            if line.len() < 3 {
                return Err(SmtpProbeError::protocol(
                    &self.host,
                    format!("short reply line: {line:?}"),
                ));
            }
            let parsed_code = line
                .get(..3)
                .and_then(|digits| digits.parse::<u16>().ok())
                .filter(|code| (200..600).contains(code))
                .ok_or_else(|| {
                    SmtpProbeError::protocol(&self.host, format!("invalid reply code: {line:?}"))
                })?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(SmtpProbeError::protocol(
                        &self.host,
                        format!("inconsistent reply codes: {existing} vs {parsed_code}"),
                    ));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }

            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if is_last {
                break;
            }
        }

        Ok(SmtpReply {
            code: code.unwrap_or_default(),
            lines,
        })
    }

    async fn read_line(&mut self) -> Result<String, SmtpProbeError> {
        let mut buf = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(SmtpProbeError::io)?;
        if read == 0 {
            return Err(SmtpProbeError::protocol(
                &self.host,
                "connection closed by server",
            ));
        }
        if buf.last() != Some(&b'\n') {
            let message = if read as u64 >= MAX_LINE_LEN {
                "reply line too long"
            } else {
                "connection closed mid-line"
            };
            return Err(SmtpProbeError::protocol(&self.host, message));
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        String::from_utf8(buf)
            .map_err(|err| SmtpProbeError::protocol(&self.host, format!("utf8 error: {err}")))
    }

    fn record(&mut self, direction: &str, message: &str) {
        self.transcript
            .push(format!("[{}] {direction}: {message}", self.host));
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            self.record("S", &reply.code.to_string());
        } else {
            for line in reply.lines.clone() {
                self.record("S", &format!("{} {line}", reply.code));
            }
        }
    }
}
