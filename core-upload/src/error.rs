use core_api::ApiError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid upload source: {0}")]
    InvalidSource(String),

    #[error("File is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage rejected the transfer{}: {message}", part_label(.part_number))]
    Transfer {
        part_number: Option<u32>,
        message: String,
    },

    #[error("Storage returned no ETag for part {part_number}")]
    MissingETag { part_number: u32 },

    #[error("Transfer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend returned an unusable multipart plan: {0}")]
    InvalidPlan(String),

    #[error("Backend did not confirm the upload: {0}")]
    NotConfirmed(String),

    #[error("Upload task ended abnormally: {0}")]
    TaskFailed(String),

    #[error("Upload manager is shut down")]
    ShutDown,

    /// Internal signal; callers see [`UploadOutcome::Cancelled`](crate::UploadOutcome::Cancelled).
    #[error("Upload cancelled")]
    Cancelled,
}

fn part_label(part_number: &Option<u32>) -> String {
    part_number
        .map(|n| format!(" of part {}", n))
        .unwrap_or_default()
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;
