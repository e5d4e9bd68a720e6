//! # File Listing
//!
//! Paginated view of the files stored in the bucket, with deletion.
//!
//! [`FileListing`] keeps the displayed [`Page`] and a loading flag the UI can
//! watch. Deleting a file always refetches the displayed page from the
//! backend instead of editing the page locally.

pub mod error;
pub mod listing;
pub mod pagination;

pub use error::{FilesError, Result};
pub use listing::FileListing;
pub use pagination::{Page, PageRequest};
