use thiserror::Error;

/// Service layer errors - combines all error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    StoreError(#[from] calstream_store::error::StoreError),

    #[error(transparent)]
    CoreError(#[from] calstream_core::error::CoreError),

    #[error("Background task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
