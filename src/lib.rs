#![forbid(unsafe_code)]
//! mailverify_lib — vérification de délivrabilité d'adresses e-mail
//!
//! Syntax, DNS/MX, SMTP mailbox probing and reference-list checks folded
//! into one verdict per address, with an MX skip list and per-domain rate
//! limiting to stay polite with remote servers, and bulk jobs on top.

pub mod bulk;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod mx;
pub mod orchestrator;
pub mod pipeline;
pub mod ratelimit;
pub mod reference;
pub mod skiplist;
pub mod smtp_verify;
pub mod storage;
pub mod validator;

pub use bulk::{BulkJob, BulkOptions, BulkRunner, JobError, JobId, JobStatus};
pub use cancel::CancelToken;
pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, Stores};
pub use error::VerifyError;
pub use monitor::{MonitorPayload, MonitorRef, Notifier, check_and_notify};
pub use mx::{DnsError, MailRoute, MxRecord, MxResolver};
pub use orchestrator::Verifier;
pub use pipeline::{
    CheckFlags, CheckPipeline, ResultCode, VerificationRequest, VerificationResult,
    VerificationState,
};
pub use ratelimit::{RateLimitExceeded, SmtpRateLimiter};
pub use reference::{ReferenceData, ReferenceHandle};
pub use skiplist::{MxSkipEntry, MxSkipList};
pub use smtp_verify::{MailboxProber, ProbeOutcome, SmtpProbeResult, SmtpProber};
pub use storage::{MemoryStore, StorageError};
pub use validator::{NormalizedEmail, ValidationMode, ValidationReport, normalize_email, validate_email};
