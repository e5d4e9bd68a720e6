//! # Upload Module
//!
//! Direct-to-storage uploads for the r2box client.
//!
//! ## Overview
//!
//! The backend never sees file bytes. It hands out presigned URLs, the client
//! PUTs to storage directly, then the backend is told the object is in place.
//! Files at or above the multipart threshold are split into parts that are
//! uploaded concurrently.
//!
//! ## Components
//!
//! - [`UploadManager`] validates a source and spawns an upload session
//! - [`UploadHandle`] reports progress, cancels and awaits the outcome
//! - [`UploadState`] is the session lifecycle, with enforced transitions
//! - [`UploadSource`] reads the bytes, from memory or one range at a time
//!   from disk
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_upload::{UploadManager, UploadOutcome, UploadSource};
//! use futures::StreamExt;
//!
//! # async fn example(uploads: UploadManager) -> core_upload::Result<()> {
//! let source = UploadSource::from_path("/tmp/report.pdf")
//!     .await?
//!     .with_content_type("application/pdf");
//! let handle = uploads.start_upload(source).await?;
//!
//! let mut progress = Box::pin(handle.progress());
//! while let Some(snapshot) = progress.next().await {
//!     println!("{} {}%", snapshot.state, snapshot.percent);
//! }
//!
//! if let UploadOutcome::Completed(receipt) = handle.join().await? {
//!     println!("{}", receipt.download_url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handle;
pub mod manager;
pub mod progress;
pub mod source;
pub mod state;
mod task;

pub use error::{Result, UploadError};
pub use handle::{UploadHandle, UploadOutcome, UploadReceipt};
pub use manager::UploadManager;
pub use progress::UploadProgress;
pub use source::{UploadSource, DEFAULT_CONTENT_TYPE};
pub use state::UploadState;
