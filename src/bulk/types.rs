use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::VerificationState;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// `job_<utc timestamp>_<6 hex digits>`.
    pub fn generate() -> Self {
        let suffix: u32 = rand::thread_rng().gen_range(0..0x0100_0000);
        Self(format!(
            "job_{}_{suffix:06x}",
            Utc::now().format("%Y%m%d%H%M%S")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which counter a finished address lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterKind {
    Valid,
    Invalid,
    Risky,
    Error,
}

impl From<VerificationState> for CounterKind {
    fn from(state: VerificationState) -> Self {
        match state {
            VerificationState::Deliverable => Self::Valid,
            VerificationState::Undeliverable => Self::Invalid,
            VerificationState::Risky | VerificationState::Unknown => Self::Risky,
            VerificationState::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobTransition {
    Start { total: u64, at: DateTime<Utc> },
    Complete { artifact: PathBuf, at: DateTime<Utc> },
    Fail { message: String, at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStateError {
    #[error("job cannot go from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
    #[error("counters can only move while processing (status: {0})")]
    NotProcessing(JobStatus),
    #[error("processed count would exceed total of {0}")]
    CounterOverflow(u64),
    #[error("{processed} of {total} addresses processed")]
    Incomplete { processed: u64, total: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkJob {
    pub id: JobId,
    pub owner: String,
    pub status: JobStatus,
    pub total_emails: u64,
    pub processed_emails: u64,
    pub valid_emails: u64,
    pub invalid_emails: u64,
    pub risky_emails: u64,
    pub error_emails: u64,
    pub source: PathBuf,
    pub artifact: Option<PathBuf>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn new(id: JobId, owner: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            id,
            owner: owner.into(),
            status: JobStatus::Pending,
            total_emails: 0,
            processed_emails: 0,
            valid_emails: 0,
            invalid_emails: 0,
            risky_emails: 0,
            error_emails: 0,
            source: source.into(),
            artifact: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// `processed = valid + invalid + risky + error`, `processed <= total`.
    pub fn counters_consistent(&self) -> bool {
        self.processed_emails
            == self.valid_emails + self.invalid_emails + self.risky_emails + self.error_emails
            && self.processed_emails <= self.total_emails
    }

    pub fn apply(&mut self, transition: JobTransition) -> Result<(), JobStateError> {
        match transition {
            JobTransition::Start { total, at } => {
                self.expect_status(JobStatus::Pending, JobStatus::Processing)?;
                self.status = JobStatus::Processing;
                self.total_emails = total;
                self.started_at = Some(at);
            }
            JobTransition::Complete { artifact, at } => {
                self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
                if self.processed_emails != self.total_emails {
                    return Err(JobStateError::Incomplete {
                        processed: self.processed_emails,
                        total: self.total_emails,
                    });
                }
                self.status = JobStatus::Completed;
                self.artifact = Some(artifact);
                self.completed_at = Some(at);
            }
            JobTransition::Fail { message, at } => {
                if self.status.is_terminal() {
                    return Err(JobStateError::InvalidTransition {
                        from: self.status,
                        to: JobStatus::Failed,
                    });
                }
                self.status = JobStatus::Failed;
                self.error_message = Some(message);
                self.completed_at = Some(at);
            }
        }
        Ok(())
    }

    pub fn count(&mut self, kind: CounterKind) -> Result<(), JobStateError> {
        if self.status != JobStatus::Processing {
            return Err(JobStateError::NotProcessing(self.status));
        }
        if self.processed_emails >= self.total_emails {
            return Err(JobStateError::CounterOverflow(self.total_emails));
        }
        self.processed_emails += 1;
        match kind {
            CounterKind::Valid => self.valid_emails += 1,
            CounterKind::Invalid => self.invalid_emails += 1,
            CounterKind::Risky => self.risky_emails += 1,
            CounterKind::Error => self.error_emails += 1,
        }
        Ok(())
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<(), JobStateError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(JobStateError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}
