use std::time::Duration;

use thiserror::Error;

/// An error that happens while deriving a key or running a computation.
///
/// This error enum is intended to be distributed to every caller waiting on
/// the same computation. It is `Clone` and carries stringified error details
/// rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key parameters could not be serialized into a canonical form.
    ///
    /// This is fatal to the call and raised before the computation or the
    /// store are ever involved.
    #[error("malformed key parameters: {0}")]
    MalformedKey(String),
    /// The computation itself failed.
    ///
    /// The attached string contains the underlying error message.
    #[error("computation failed: {0}")]
    Compute(String),
    /// The computation did not finish within the configured deadline.
    #[error("computation timed out after {0:?}")]
    Timeout(Duration),
    /// An unexpected error in the caching layer itself.
    #[error("internal error")]
    InternalError,
}

impl CacheError {
    /// Creates a [`CacheError::Compute`] from an arbitrary error.
    pub fn for_compute<E: std::fmt::Display>(error: E) -> Self {
        Self::Compute(error.to_string())
    }
}

/// The outcome of a cache operation, either a value or the error the
/// computation resolved to.
pub type CacheContents<T = ()> = Result<T, CacheError>;

/// An error raised by a [`CacheStore`](crate::CacheStore) backend.
///
/// Store errors never escape the [`Cacher`](crate::Cacher): failed reads
/// degrade to misses and failed writes are logged and swallowed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing medium failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A stored entry could not be decoded.
    #[error("malformed cache entry: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The backend could not be reached.
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}
