//! Caller-side view of a running upload.

use crate::error::{Result, UploadError};
use crate::progress::UploadProgress;
use crate::state::UploadState;
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What the backend handed back for a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub upload_id: String,
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    /// Absolute download link
    pub download_url: String,
    /// Absolute share link, when the backend issued a short code
    pub short_url: Option<String>,
    pub expires_at: Option<String>,
    pub multipart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed(UploadReceipt),
    Cancelled,
}

impl UploadOutcome {
    pub fn receipt(&self) -> Option<&UploadReceipt> {
        match self {
            UploadOutcome::Completed(receipt) => Some(receipt),
            UploadOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadOutcome::Cancelled)
    }
}

/// Handle to an upload running on the runtime.
///
/// Dropping the handle does not stop the upload; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct UploadHandle {
    id: String,
    filename: String,
    size: u64,
    multipart: bool,
    cancel: CancellationToken,
    progress: watch::Receiver<UploadProgress>,
    task: JoinHandle<Result<UploadOutcome>>,
}

impl UploadHandle {
    pub(crate) fn new(
        id: String,
        filename: String,
        size: u64,
        multipart: bool,
        cancel: CancellationToken,
        progress: watch::Receiver<UploadProgress>,
        task: JoinHandle<Result<UploadOutcome>>,
    ) -> Self {
        Self {
            id,
            filename,
            size,
            multipart,
            cancel,
            progress,
            task,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    pub fn status(&self) -> UploadState {
        self.progress.borrow().state
    }

    pub fn snapshot(&self) -> UploadProgress {
        *self.progress.borrow()
    }

    /// Stream of progress snapshots, starting with the current one and ending
    /// after a terminal state. Intermediate values may be coalesced; percent
    /// never decreases.
    pub fn progress(&self) -> impl Stream<Item = UploadProgress> + Send + 'static {
        let receiver = self.progress.clone();
        stream::unfold(
            (receiver, true, false),
            |(mut receiver, first, finished)| async move {
                if finished {
                    return None;
                }
                if !first && receiver.changed().await.is_err() {
                    return None;
                }
                let snapshot = *receiver.borrow_and_update();
                Some((snapshot, (receiver, false, snapshot.state.is_terminal())))
            },
        )
    }

    /// Request cancellation. Safe to call more than once or after the upload
    /// has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this upload, for callers that hand [`join`](Self::join)
    /// to another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the upload to settle.
    pub async fn join(self) -> Result<UploadOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(UploadOutcome::Cancelled),
            Err(e) => Err(UploadError::TaskFailed(e.to_string())),
        }
    }
}
