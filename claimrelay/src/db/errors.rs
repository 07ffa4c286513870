use thiserror::Error;

/// Unified error type for blob store operations that application code can handle
#[derive(Error, Debug)]
pub enum StoreError {
    /// No stored file exists for the given identifier
    #[error("Stored file not found")]
    NotFound,

    /// The store could not be reached (connection refused, pool exhausted, ...)
    #[error("Blob store unavailable: {0}")]
    Unavailable(String),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error, separating connectivity failures from everything else
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Other(anyhow::Error::from(err)),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Other(anyhow::Error::from(err))
    }
}

/// Type alias for blob store operation results
pub type Result<T> = std::result::Result<T, StoreError>;
