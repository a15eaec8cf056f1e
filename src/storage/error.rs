use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },
    #[error("conflicting update: {0}")]
    Conflict(String),
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn job_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            what: "job",
            id: id.to_string(),
        }
    }

    /// Worth retrying the same write.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}
