use std::error::Error;
use thiserror::Error;

/// Result alias used by every row-store trait method.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure surfaced by a row-store backend.
///
/// Backends collapse their driver-specific errors into this single variant;
/// the service layer only needs to know that the backend failed, not how.
/// "No backend installed" (degraded mode) is a separate condition and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("row store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure, keeping the original error in the source chain.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
