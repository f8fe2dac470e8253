use thiserror::Error;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(i64),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error(transparent)]
    CoreError(#[from] calstream_core::error::CoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
