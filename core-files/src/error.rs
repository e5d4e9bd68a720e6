use core_api::ApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid page {0}: pages start at 1")]
    InvalidPage(u32),

    #[error("Invalid file id: {0:?}")]
    InvalidFileId(String),
}

pub type Result<T> = std::result::Result<T, FilesError>;
