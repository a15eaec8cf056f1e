use std::path::PathBuf;

use thiserror::Error;

use super::{JobId, JobStatus};
use crate::storage::StorageError;

/// Failures fatal to one bulk job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(JobId),
    #[error("job {id} is {status}, only pending jobs can run")]
    InvalidState { id: JobId, status: JobStatus },
    #[error("cannot read source {path}: {message}")]
    Source { path: PathBuf, message: String },
    #[error("cannot write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("job cancelled")]
    Cancelled,
}

impl JobError {
    pub(crate) fn bad_source(path: &std::path::Path, message: impl ToString) -> Self {
        Self::Source {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub(crate) fn artifact(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Artifact {
            path: path.to_path_buf(),
            source,
        }
    }
}
