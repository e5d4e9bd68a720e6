use core_api::ApiError;
use core_auth::AuthError;
use core_files::FilesError;
use core_upload::UploadError;
use thiserror::Error;

/// Errors surfaced by the client facade.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Client initialization failed: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Client has been disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
